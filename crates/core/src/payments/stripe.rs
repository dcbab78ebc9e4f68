//! Stripe Checkout gateway.
//!
//! Sessions are created with a form-encoded `POST /v1/checkout/sessions` authenticated by the
//! secret key. The blocking client is built per request so that it is created and dropped on the
//! calling (blocking) thread, never on an async worker.

use super::gateway::{CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway};
use serde::Deserialize;

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

#[derive(Clone)]
pub struct StripeGateway {
    secret_key: String,
    api_base: String,
}

impl std::fmt::Debug for StripeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeGateway")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>, api_base: &str) -> Self {
        Self {
            secret_key: secret_key.into(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn form(request: &CheckoutRequest) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            (
                "line_items[0][price_data][currency]".to_string(),
                request.currency.clone(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                request.description.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                request.unit_amount.to_string(),
            ),
            (
                "line_items[0][quantity]".to_string(),
                request.quantity.to_string(),
            ),
        ];
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }
        form
    }
}

impl PaymentGateway for StripeGateway {
    fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let url = format!("{}/v1/checkout/sessions", self.api_base);
        let response = client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&Self::form(request))
            .send()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or(body);
            tracing::warn!("checkout session rejected with {}: {}", status, message);
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let session: SessionResponse = response
            .json()
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        let redirect_url = session.url.ok_or_else(|| {
            GatewayError::InvalidResponse(format!("session {} has no url", session.id))
        })?;

        tracing::info!("created checkout session {}", session.id);
        Ok(CheckoutSession {
            session_id: session.id,
            redirect_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn form_encodes_single_line_item_and_metadata() {
        let request = CheckoutRequest {
            currency: "usd".into(),
            unit_amount: 7500,
            quantity: 1,
            description: "Consultation".into(),
            success_url: "http://localhost:3000/payments/success".into(),
            cancel_url: "http://localhost:3000/payments/cancel".into(),
            metadata: BTreeMap::from([("invoice_id".to_string(), "abc".to_string())]),
        };

        let form = StripeGateway::form(&request);
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("7500"));
        assert_eq!(get("line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(
            get("line_items[0][price_data][product_data][name]"),
            Some("Consultation")
        );
        assert_eq!(get("line_items[0][quantity]"), Some("1"));
        assert_eq!(get("metadata[invoice_id]"), Some("abc"));
    }

    #[test]
    fn new_trims_trailing_slash_and_hides_key() {
        let gateway = StripeGateway::new("sk_test_secret", "https://api.stripe.com/");
        assert_eq!(gateway.api_base, DEFAULT_API_BASE);
        assert!(!format!("{:?}", gateway).contains("sk_test_secret"));
    }
}
