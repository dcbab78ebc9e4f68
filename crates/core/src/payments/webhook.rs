//! Webhook signature verification and event decoding.
//!
//! Signed deliveries carry a header of the form `t=<unix seconds>,v1=<hex>[,v1=<hex>...]`. The
//! signature is HMAC-SHA256 over `"<t>.<raw body>"` keyed with the shared webhook secret. Any one
//! matching `v1` entry is accepted, so the provider can roll secrets.

use crate::constants::{CHECKOUT_COMPLETED_EVENT, INVOICE_ID_METADATA_KEY, WEBHOOK_TOLERANCE_SECS};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,
    #[error("malformed signature header")]
    MalformedHeader,
    #[error("signature timestamp outside tolerance")]
    TimestampOutOfTolerance,
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error("malformed event payload: {0}")]
    MalformedPayload(String),
}

/// Verifies a signed delivery against `secret` at time `now`.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<(), WebhookError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse().map_err(|_| WebhookError::MalformedHeader)?)
            }
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader);
    }

    let skew = now
        .timestamp()
        .checked_sub(timestamp)
        .map(i64::unsigned_abs);
    if skew.map_or(true, |secs| secs > WEBHOOK_TOLERANCE_SECS.unsigned_abs()) {
        tracing::warn!(
            "webhook timestamp {} is more than {}s from now",
            timestamp,
            WEBHOOK_TOLERANCE_SECS
        );
        return Err(WebhookError::TimestampOutOfTolerance);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::SignatureMismatch)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures.iter().any(|candidate| match hex::decode(candidate) {
        Ok(bytes) => mac.clone().verify_slice(&bytes).is_ok(),
        Err(_) => false,
    });
    if matched {
        Ok(())
    } else {
        Err(WebhookError::SignatureMismatch)
    }
}

/// The checkout session object carried by a completion event.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct CheckoutSessionObject {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
}

impl CheckoutSessionObject {
    /// Invoice identifier placed in the session metadata at checkout creation, if any.
    pub fn invoice_id(&self) -> Option<&str> {
        self.metadata
            .as_ref()?
            .get(INVOICE_ID_METADATA_KEY)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum WebhookEvent {
    CheckoutCompleted {
        event_id: String,
        session: CheckoutSessionObject,
        /// `data.object` exactly as delivered.
        raw: Value,
    },
    Ignored {
        event_id: String,
        kind: String,
    },
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(default)]
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: RawData,
}

#[derive(Default, Deserialize)]
struct RawData {
    #[serde(default)]
    object: Value,
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, WebhookError> {
        let event: RawEvent = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

        if event.kind != CHECKOUT_COMPLETED_EVENT {
            return Ok(WebhookEvent::Ignored {
                event_id: event.id,
                kind: event.kind,
            });
        }

        let raw = event.data.object;
        let session = CheckoutSessionObject::deserialize(&raw)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;
        Ok(WebhookEvent::CheckoutCompleted {
            event_id: event.id,
            session,
            raw,
        })
    }
}
