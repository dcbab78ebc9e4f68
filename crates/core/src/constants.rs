//! Constants used throughout the clinic core crate.

/// Default directory for record storage when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "clinic_data";

/// Default base URL used to build checkout redirect URLs.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Default ISO 4217 currency code sent to the payment gateway.
pub const DEFAULT_CURRENCY: &str = "usd";

/// Filename of a record document inside its sharded directory.
pub const RECORD_FILENAME: &str = "record.json";

/// Display name used when an appointment or invoice references a deleted patient.
pub const UNKNOWN_PATIENT_NAME: &str = "Unknown";

/// Metadata key carrying the invoice identifier through the checkout session.
pub const INVOICE_ID_METADATA_KEY: &str = "invoice_id";

/// Placeholder the gateway substitutes with the real session id in the success URL.
pub const CHECKOUT_SESSION_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Maximum age (seconds) of a signed webhook timestamp.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Webhook event type that completes an invoice payment.
pub const CHECKOUT_COMPLETED_EVENT: &str = "checkout.session.completed";
