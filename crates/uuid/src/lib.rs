//! Record identifiers.
//!
//! Every patient, appointment and invoice is keyed by a [`RecordId`]: a version 4 UUID held in a
//! *canonical* text form of **32 lowercase hexadecimal characters** (no hyphens).
//!
//! This crate provides:
//! - [`RecordId`], which guarantees the canonical form once constructed.
//! - Sharding logic used by the file-backed store to place record files.
//!
//! ## Canonical form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Identifiers arriving from outside (URL paths, webhook metadata, CLI arguments) must already be
//! canonical. Use [`RecordId::parse`] to validate them; anything else is rejected, and callers in
//! the workflow layer treat a rejected identifier the same as an unknown one.
//!
//! ## Sharded layout
//! For a canonical identifier `u`, the file store keeps the record at:
//! `collection_dir/<u[0..2]>/<u[2..4]>/<u>/record.json`

mod service;

pub use service::RecordId;

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
