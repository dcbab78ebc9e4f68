//! Hosted-checkout payments and webhook reconciliation.
//!
//! [`PaymentService::request_payment`] asks the gateway for a checkout page for an unpaid invoice.
//! The invoice only becomes `paid` later, when [`PaymentService::handle_webhook`] receives a
//! verified `checkout.session.completed` event naming it.

mod gateway;
mod stripe;
mod webhook;

pub use gateway::{
    CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway, UnconfiguredGateway,
};
pub use stripe::{StripeGateway, DEFAULT_API_BASE};
pub use webhook::{verify_signature, CheckoutSessionObject, WebhookError, WebhookEvent};

use crate::config::CoreConfig;
use crate::constants::{CHECKOUT_SESSION_PLACEHOLDER, INVOICE_ID_METADATA_KEY};
use crate::repositories::invoices::{InvoiceService, PaymentOutcome};
use crate::store::RecordStore;
use crate::{ClinicError, ClinicResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a webhook delivery did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The named invoice moved to `paid`.
    Applied { invoice_id: String },
    /// The named invoice was already `paid`.
    AlreadyPaid { invoice_id: String },
    /// The completion named an invoice that does not exist.
    UnknownInvoice { invoice_id: String },
    /// The completion carried no invoice identifier.
    MissingInvoiceMetadata,
    /// Event type the clinic does not act on.
    Ignored { kind: String },
}

#[derive(Clone)]
pub struct PaymentService {
    invoices: InvoiceService,
    gateway: Arc<dyn PaymentGateway>,
    cfg: Arc<CoreConfig>,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        gateway: Arc<dyn PaymentGateway>,
        cfg: Arc<CoreConfig>,
    ) -> Self {
        Self {
            invoices: InvoiceService::new(store),
            gateway,
            cfg,
        }
    }

    /// Creates a hosted checkout session for an unpaid invoice.
    ///
    /// The invoice is not modified. The gateway is only contacted once the invoice is known to
    /// exist and be unpaid.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::NotFound`] if the invoice does not exist.
    /// - [`ClinicError::AlreadyPaid`] if the invoice is already paid.
    /// - [`ClinicError::Gateway`] if the provider call fails.
    pub fn request_payment(&self, invoice_id: &str) -> ClinicResult<CheckoutSession> {
        let invoice = self.invoices.get(invoice_id)?;
        if invoice.is_paid() {
            return Err(ClinicError::AlreadyPaid(invoice.id));
        }

        let base = self.cfg.base_url();
        let request = CheckoutRequest {
            currency: self.cfg.currency().to_string(),
            unit_amount: invoice.total.to_minor_units()?,
            quantity: 1,
            description: invoice.charge_description(),
            success_url: format!(
                "{}/payments/success?invoice_id={}&session_id={}",
                base, invoice.id, CHECKOUT_SESSION_PLACEHOLDER
            ),
            cancel_url: format!("{}/payments/cancel?invoice_id={}", base, invoice.id),
            metadata: BTreeMap::from([(
                INVOICE_ID_METADATA_KEY.to_string(),
                invoice.id.to_string(),
            )]),
        };

        let session = self.gateway.create_checkout_session(&request)?;
        tracing::info!(
            "checkout session {} created for invoice {} ({} minor units)",
            session.session_id,
            invoice.id,
            request.unit_amount
        );
        Ok(session)
    }

    /// Authenticates and applies one webhook delivery.
    ///
    /// With a webhook secret configured, `signature` must verify against the raw `payload`;
    /// without one the payload is trusted as-is. Deliveries that do not identify a known invoice
    /// are acknowledged without side effects.
    ///
    /// # Errors
    ///
    /// [`ClinicError::Webhook`] if the signature fails or the payload is not an event. No
    /// invoice is touched in that case.
    pub fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        now: DateTime<Utc>,
    ) -> ClinicResult<WebhookOutcome> {
        match self.cfg.webhook_secret() {
            Some(secret) => {
                let header = signature.ok_or(WebhookError::MissingSignature)?;
                verify_signature(payload, header, secret, now)?;
            }
            None => {
                tracing::warn!("no webhook secret configured, accepting unsigned webhook payload");
            }
        }

        let (session, raw) = match WebhookEvent::parse(payload)? {
            WebhookEvent::CheckoutCompleted {
                event_id,
                session,
                raw,
            } => {
                tracing::info!("webhook {}: checkout session {} completed", event_id, session.id);
                (session, raw)
            }
            WebhookEvent::Ignored { event_id, kind } => {
                tracing::info!("webhook {}: ignoring event type {}", event_id, kind);
                return Ok(WebhookOutcome::Ignored { kind });
            }
        };

        let Some(invoice_id) = session.invoice_id().map(str::to_string) else {
            tracing::warn!("checkout session {} carries no invoice_id metadata", session.id);
            return Ok(WebhookOutcome::MissingInvoiceMetadata);
        };

        match self.invoices.mark_paid(&invoice_id, raw) {
            Ok(PaymentOutcome::Applied) => Ok(WebhookOutcome::Applied { invoice_id }),
            Ok(PaymentOutcome::AlreadyPaid) => Ok(WebhookOutcome::AlreadyPaid { invoice_id }),
            Err(ClinicError::NotFound { .. }) => {
                tracing::warn!("checkout completed for unknown invoice {}", invoice_id);
                Ok(WebhookOutcome::UnknownInvoice { invoice_id })
            }
            Err(e) => Err(e),
        }
    }
}
