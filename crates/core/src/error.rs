use crate::payments::{GatewayError, WebhookError};
use crate::store::Collection;
use clinic_uuid::RecordId;

#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    #[error("{collection} not found: {id}")]
    NotFound { collection: Collection, id: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invoice {0} is already paid")]
    AlreadyPaid(RecordId),

    #[error("payment gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("webhook rejected: {0}")]
    Webhook(#[from] WebhookError),

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to write record file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read record file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to remove record: {0}")]
    FileRemove(std::io::Error),
    #[error("failed to serialize record: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize record: {0}")]
    Deserialization(serde_json::Error),
    #[error("record store lock poisoned")]
    LockPoisoned,
}

impl ClinicError {
    pub(crate) fn not_found(collection: Collection, id: impl ToString) -> Self {
        Self::NotFound {
            collection,
            id: id.to_string(),
        }
    }
}

impl From<clinic_types::TextError> for ClinicError {
    fn from(err: clinic_types::TextError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<clinic_types::MoneyError> for ClinicError {
    fn from(err: clinic_types::MoneyError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

pub type ClinicResult<T> = std::result::Result<T, ClinicError>;
