//! Record persistence.
//!
//! Records are JSON documents grouped into three [`Collection`]s and keyed by [`RecordId`]. The
//! workflow layer talks to storage only through the [`RecordStore`] trait, so the backing store
//! is chosen once at startup and injected:
//!
//! - [`MemoryStore`]: process-local maps, used for tests and ephemeral runs.
//! - [`FileStore`]: one JSON file per record in a sharded directory tree.
//!
//! Every stored document carries its own identifier under the `id` key. Stores set it on insert
//! and never let a partial update change it.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::{ClinicError, ClinicResult};
use clinic_uuid::RecordId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// A stored record: a JSON object.
pub type Document = serde_json::Map<String, Value>;

/// Key under which every document stores its identifier.
pub const ID_FIELD: &str = "id";

/// The three record collections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Patients,
    Appointments,
    Invoices,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::Patients,
        Collection::Appointments,
        Collection::Invoices,
    ];

    /// Directory name used by the file store.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Collection::Patients => "patients",
            Collection::Appointments => "appointments",
            Collection::Invoices => "invoices",
        }
    }

    /// Singular record name used in messages.
    pub fn record_name(&self) -> &'static str {
        match self {
            Collection::Patients => "patient",
            Collection::Appointments => "appointment",
            Collection::Invoices => "invoice",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.record_name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Sort order for [`RecordStore::find_all`].
#[derive(Clone, Copy, Debug)]
pub struct SortBy<'a> {
    pub key: &'a str,
    pub direction: SortDirection,
}

impl<'a> SortBy<'a> {
    pub fn ascending(key: &'a str) -> Self {
        Self {
            key,
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(key: &'a str) -> Self {
        Self {
            key,
            direction: SortDirection::Descending,
        }
    }
}

/// Persistence contract used by every workflow service.
///
/// Implementations must be safe to share across request handlers.
pub trait RecordStore: Send + Sync {
    /// Returns every document in `collection`, optionally sorted.
    fn find_all(&self, collection: Collection, sort: Option<SortBy<'_>>)
        -> ClinicResult<Vec<Document>>;

    /// Returns the document with `id`, or `None` if there is none.
    fn find_one(&self, collection: Collection, id: &RecordId) -> ClinicResult<Option<Document>>;

    /// Stores a new document under a freshly generated identifier and returns it.
    fn insert(&self, collection: Collection, document: Document) -> ClinicResult<RecordId>;

    /// Replaces the given top-level fields of an existing document.
    ///
    /// Returns `false` if no document with `id` exists.
    fn update_fields(
        &self,
        collection: Collection,
        id: &RecordId,
        partial: Document,
    ) -> ClinicResult<bool>;

    /// Removes a document. Returns `false` if no document with `id` existed.
    fn delete(&self, collection: Collection, id: &RecordId) -> ClinicResult<bool>;
}

/// Serializes a record into a document.
pub fn encode<T: Serialize>(record: &T) -> ClinicResult<Document> {
    match serde_json::to_value(record).map_err(ClinicError::Serialization)? {
        Value::Object(map) => Ok(map),
        other => Err(ClinicError::InvalidInput(format!(
            "record must serialize to a JSON object, got: {}",
            other
        ))),
    }
}

/// Deserializes a document into a typed record, applying each field's decode default.
pub fn decode<T: DeserializeOwned>(document: Document) -> ClinicResult<T> {
    serde_json::from_value(Value::Object(document)).map_err(ClinicError::Deserialization)
}

/// Merges `partial` into `document`. The `id` field is never overwritten.
pub(crate) fn merge_fields(document: &mut Document, partial: Document) {
    for (key, value) in partial {
        if key == ID_FIELD {
            continue;
        }
        document.insert(key, value);
    }
}

/// Sorts documents by a top-level field.
///
/// Missing and `null` values sort first, then booleans, numbers, strings, and anything else.
/// Strings compare case-insensitively, falling back to a case-sensitive comparison for ties.
pub(crate) fn sort_documents(documents: &mut [Document], sort: SortBy<'_>) {
    documents.sort_by(|a, b| {
        let ordering = compare_values(a.get(sort.key), b.get(sort.key));
        match sort.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(_) => 4,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x
            .to_lowercase()
            .cmp(&y.to_lowercase())
            .then_with(|| x.cmp(y)),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
