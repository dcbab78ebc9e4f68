//! Record workflow services.
//!
//! Each service wraps an injected [`RecordStore`](crate::store::RecordStore) and owns the
//! validation and shaping rules for one collection.

pub mod appointments;
pub mod invoices;
pub mod patients;

use crate::store::Collection;
use crate::{ClinicError, ClinicResult};
use clinic_uuid::RecordId;

/// Parses an externally supplied identifier.
///
/// Strings that are not canonical identifiers cannot name any stored record, so they are
/// reported as [`ClinicError::NotFound`] rather than as a validation failure.
pub(crate) fn lookup_id(collection: Collection, id: &str) -> ClinicResult<RecordId> {
    RecordId::parse(id).map_err(|_| ClinicError::not_found(collection, id))
}

