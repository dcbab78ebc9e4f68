//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services.
//! Request handling never reads process-wide environment variables.

use crate::{ClinicError, ClinicResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    base_url: String,
    currency: String,
    webhook_secret: Option<String>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// `base_url` must be an absolute `http(s)` URL; a trailing slash is removed. `currency` must
    /// be a three-letter code and is stored lowercase. An empty or whitespace-only
    /// `webhook_secret` is treated as absent.
    pub fn new(
        data_dir: PathBuf,
        base_url: &str,
        currency: &str,
        webhook_secret: Option<String>,
    ) -> ClinicResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        let valid_url = match base_url.split_once("://") {
            Some((scheme, rest)) => matches!(scheme, "http" | "https") && !rest.is_empty(),
            None => false,
        };
        if !valid_url {
            return Err(ClinicError::InvalidInput(format!(
                "base_url must be an absolute http(s) URL, got: '{}'",
                base_url
            )));
        }

        let currency = currency.trim().to_ascii_lowercase();
        if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_lowercase()) {
            return Err(ClinicError::InvalidInput(format!(
                "currency must be a three-letter code, got: '{}'",
                currency
            )));
        }

        let webhook_secret = webhook_secret
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            data_dir,
            base_url: base_url.to_string(),
            currency,
            webhook_secret,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Shared secret for webhook signatures. `None` selects the unsigned fallback mode.
    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret.as_deref()
    }
}
