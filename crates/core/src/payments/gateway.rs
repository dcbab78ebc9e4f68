//! Payment gateway seam.
//!
//! A gateway turns an invoice amount into a hosted checkout page. Implementations must not touch
//! invoice state; reconciliation happens later through the webhook.

use std::collections::BTreeMap;

/// What the clinic asks the provider to charge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Lowercase ISO 4217 code, e.g. `usd`.
    pub currency: String,
    /// Amount per unit in minor currency units.
    pub unit_amount: i64,
    pub quantity: u32,
    pub description: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: BTreeMap<String, String>,
}

/// A created checkout session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutSession {
    pub session_id: String,
    /// Hosted page the payer is sent to.
    pub redirect_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("payment gateway is not configured")]
    NotConfigured,
    #[error("payment gateway request failed: {0}")]
    Transport(String),
    #[error("payment gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("payment gateway returned an unexpected response: {0}")]
    InvalidResponse(String),
}

pub trait PaymentGateway: Send + Sync {
    /// Creates a hosted checkout session. Blocking; callers on an async runtime should move it
    /// onto a blocking thread.
    fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError>;
}

/// Gateway used when no provider credentials are configured. Every request fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnconfiguredGateway;

impl PaymentGateway for UnconfiguredGateway {
    fn create_checkout_session(
        &self,
        _request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        Err(GatewayError::NotConfigured)
    }
}
