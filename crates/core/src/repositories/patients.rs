//! Patient registry.
//!
//! Patients are the root of the record chain: appointments reference a patient, invoices
//! reference an appointment and copy its patient reference. Deleting a patient does **not**
//! cascade; dependants keep their (now dangling) reference and resolve it to
//! [`UNKNOWN_PATIENT_NAME`].
//!
//! The registry also keeps the two legacy per-patient fields of the flat registry shape: a
//! free-text appointment note and a flat billing balance.

use super::lookup_id;
use crate::constants::UNKNOWN_PATIENT_NAME;
use crate::store::{decode, encode, Collection, RecordStore, SortBy};
use crate::{ClinicError, ClinicResult};
use chrono::{DateTime, Utc};
use clinic_types::{EmailAddress, Money, NonEmptyText};
use clinic_uuid::RecordId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const COLLECTION: Collection = Collection::Patients;

/// A stored patient.
///
/// Fields missing from a stored document decode to their defaults: empty strings for text,
/// `None` for the appointment note, zero for the balance and the Unix epoch for `created_at`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub appointment_note: Option<String>,
    #[serde(default)]
    pub billing_balance: Money,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

/// Registration input. Every field is trimmed; `name` must be non-empty.
#[derive(Clone, Debug, Default)]
pub struct PatientFields {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
}

/// Edit input. Only `Some` fields are replaced.
#[derive(Clone, Debug, Default)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Serialize)]
struct NewPatientRecord<'a> {
    name: &'a str,
    address: &'a str,
    phone: &'a str,
    email: &'a str,
    appointment_note: Option<&'a str>,
    billing_balance: Money,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct PatientFieldsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

/// An empty email is allowed; anything else must look like an address.
fn normalise_email(email: &str) -> ClinicResult<String> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    Ok(EmailAddress::parse(trimmed)?.to_string())
}

fn normalise_name(name: &str) -> ClinicResult<String> {
    NonEmptyText::new(name)
        .map(NonEmptyText::into_inner)
        .map_err(|_| ClinicError::InvalidInput("name is required".into()))
}

/// Patient registry operations over an injected store.
#[derive(Clone)]
pub struct PatientService {
    store: Arc<dyn RecordStore>,
}

impl PatientService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Lists every patient ordered by name.
    ///
    /// Documents that fail to decode are logged and skipped.
    pub fn list(&self) -> ClinicResult<Vec<Patient>> {
        let documents = self
            .store
            .find_all(COLLECTION, Some(SortBy::ascending("name")))?;

        let mut patients = Vec::with_capacity(documents.len());
        for document in documents {
            match decode::<Patient>(document) {
                Ok(patient) => patients.push(patient),
                Err(e) => tracing::warn!("skipping undecodable patient record: {}", e),
            }
        }
        Ok(patients)
    }

    /// Registers a new patient and returns its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ClinicError::InvalidInput`] if the trimmed name is empty or a non-empty email
    /// is malformed.
    pub fn create(&self, fields: PatientFields) -> ClinicResult<RecordId> {
        let name = normalise_name(&fields.name)?;
        let email = normalise_email(&fields.email)?;

        let record = NewPatientRecord {
            name: &name,
            address: fields.address.trim(),
            phone: fields.phone.trim(),
            email: &email,
            appointment_note: None,
            billing_balance: Money::ZERO,
            created_at: Utc::now(),
        };

        let id = self.store.insert(COLLECTION, encode(&record)?)?;
        tracing::info!("registered patient {}", id);
        Ok(id)
    }

    /// Fetches one patient.
    ///
    /// # Errors
    ///
    /// Returns [`ClinicError::NotFound`] if `id` is malformed or unknown.
    pub fn get(&self, id: &str) -> ClinicResult<Patient> {
        let record_id = lookup_id(COLLECTION, id)?;
        self.find(&record_id)?
            .ok_or_else(|| ClinicError::not_found(COLLECTION, record_id))
    }

    /// Replaces the supplied contact fields of an existing patient.
    pub fn update(&self, id: &str, update: PatientUpdate) -> ClinicResult<()> {
        let record_id = lookup_id(COLLECTION, id)?;

        let patch = PatientFieldsPatch {
            name: update.name.as_deref().map(normalise_name).transpose()?,
            address: update.address.map(|s| s.trim().to_string()),
            phone: update.phone.map(|s| s.trim().to_string()),
            email: update.email.as_deref().map(normalise_email).transpose()?,
        };

        self.patch(&record_id, encode(&patch)?)
    }

    /// Removes a patient. Appointments and invoices referencing it are left untouched.
    pub fn delete(&self, id: &str) -> ClinicResult<()> {
        let record_id = lookup_id(COLLECTION, id)?;
        if !self.store.delete(COLLECTION, &record_id)? {
            return Err(ClinicError::not_found(COLLECTION, record_id));
        }
        tracing::info!("deleted patient {}", record_id);
        Ok(())
    }

    /// Replaces the legacy free-text appointment note.
    pub fn set_appointment_note(&self, id: &str, note: &str) -> ClinicResult<()> {
        let record_id = lookup_id(COLLECTION, id)?;
        let note = note.trim();
        let value = if note.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::Value::String(note.to_string())
        };

        let mut partial = crate::store::Document::new();
        partial.insert("appointment_note".into(), value);
        self.patch(&record_id, partial)
    }

    /// Replaces the legacy flat billing balance.
    pub fn set_billing_balance(&self, id: &str, balance: Money) -> ClinicResult<()> {
        let record_id = lookup_id(COLLECTION, id)?;

        let mut partial = crate::store::Document::new();
        partial.insert(
            "billing_balance".into(),
            serde_json::to_value(balance).map_err(ClinicError::Serialization)?,
        );
        self.patch(&record_id, partial)
    }

    /// Resolves the display name for a patient reference.
    ///
    /// A reference to a deleted patient resolves to [`UNKNOWN_PATIENT_NAME`].
    pub fn display_name(&self, id: &RecordId) -> ClinicResult<String> {
        Ok(self
            .find(id)?
            .map(|patient| patient.name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_PATIENT_NAME.to_string()))
    }

    fn find(&self, id: &RecordId) -> ClinicResult<Option<Patient>> {
        self.store
            .find_one(COLLECTION, id)?
            .map(decode::<Patient>)
            .transpose()
    }

    fn patch(&self, id: &RecordId, partial: crate::store::Document) -> ClinicResult<()> {
        if !self.store.update_fields(COLLECTION, id, partial)? {
            return Err(ClinicError::not_found(COLLECTION, id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> PatientService {
        PatientService::new(Arc::new(MemoryStore::new()))
    }

    fn fields(name: &str) -> PatientFields {
        PatientFields {
            name: name.into(),
            address: " 1 High Street ".into(),
            phone: "0123 456".into(),
            email: "patient@example.com".into(),
        }
    }

    #[test]
    fn create_then_get_returns_matching_record() {
        let service = service();
        let id = service.create(fields("  Ada Lovelace ")).expect("create");

        let patient = service.get(&id.to_string()).expect("get");
        assert_eq!(patient.id, id);
        assert_eq!(patient.name, "Ada Lovelace");
        assert_eq!(patient.address, "1 High Street");
        assert_eq!(patient.phone, "0123 456");
        assert_eq!(patient.email, "patient@example.com");
        assert_eq!(patient.appointment_note, None);
        assert_eq!(patient.billing_balance, Money::ZERO);
    }

    #[test]
    fn create_generates_distinct_ids() {
        let service = service();
        let ids: Vec<_> = (0..20)
            .map(|i| service.create(fields(&format!("Patient {i}"))).unwrap())
            .collect();

        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn create_rejects_blank_name_and_bad_email() {
        let service = service();

        let err = service.create(fields("   ")).expect_err("blank name");
        assert!(matches!(err, ClinicError::InvalidInput(_)));

        let mut bad_email = fields("Ada");
        bad_email.email = "not-an-email".into();
        let err = service.create(bad_email).expect_err("bad email");
        assert!(matches!(err, ClinicError::InvalidInput(_)));

        assert!(service.list().unwrap().is_empty());
    }

    #[test]
    fn create_allows_empty_contact_fields() {
        let service = service();
        let id = service
            .create(PatientFields {
                name: "Grace".into(),
                ..Default::default()
            })
            .unwrap();

        let patient = service.get(&id.to_string()).unwrap();
        assert_eq!(patient.email, "");
        assert_eq!(patient.address, "");
    }

    #[test]
    fn get_treats_malformed_and_unknown_ids_as_not_found() {
        let service = service();

        for id in ["", "not-an-id", "550E8400E29B41D4A716446655440000"] {
            assert!(matches!(
                service.get(id),
                Err(ClinicError::NotFound { .. })
            ));
        }
        assert!(matches!(
            service.get(&RecordId::new().to_string()),
            Err(ClinicError::NotFound { .. })
        ));
    }

    #[test]
    fn list_orders_by_name() {
        let service = service();
        for name in ["Charles", "ada", "Barbara"] {
            service.create(fields(name)).unwrap();
        }

        let names: Vec<_> = service.list().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["ada", "Barbara", "Charles"]);
    }

    #[test]
    fn update_replaces_only_supplied_fields() {
        let service = service();
        let id = service.create(fields("Ada")).unwrap().to_string();

        service
            .update(
                &id,
                PatientUpdate {
                    phone: Some(" 999 ".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        let patient = service.get(&id).unwrap();
        assert_eq!(patient.name, "Ada");
        assert_eq!(patient.phone, "999");
        assert_eq!(patient.email, "patient@example.com");
    }

    #[test]
    fn update_validates_and_reports_missing_patient() {
        let service = service();
        let id = service.create(fields("Ada")).unwrap().to_string();

        let err = service
            .update(
                &id,
                PatientUpdate {
                    name: Some(" ".into()),
                    ..Default::default()
                },
            )
            .expect_err("blank name");
        assert!(matches!(err, ClinicError::InvalidInput(_)));

        let err = service
            .update(&RecordId::new().to_string(), PatientUpdate::default())
            .expect_err("missing patient");
        assert!(matches!(err, ClinicError::NotFound { .. }));
    }

    #[test]
    fn delete_removes_patient() {
        let service = service();
        let id = service.create(fields("Ada")).unwrap().to_string();

        service.delete(&id).unwrap();
        assert!(matches!(service.get(&id), Err(ClinicError::NotFound { .. })));
        assert!(matches!(
            service.delete(&id),
            Err(ClinicError::NotFound { .. })
        ));
    }

    #[test]
    fn legacy_note_and_balance_are_stored() {
        let service = service();
        let id = service.create(fields("Ada")).unwrap().to_string();

        service
            .set_appointment_note(&id, " Tuesday 10am ")
            .unwrap();
        service
            .set_billing_balance(&id, "120.50".parse().unwrap())
            .unwrap();

        let patient = service.get(&id).unwrap();
        assert_eq!(patient.appointment_note.as_deref(), Some("Tuesday 10am"));
        assert_eq!(patient.billing_balance, "120.50".parse::<Money>().unwrap());

        service.set_appointment_note(&id, "  ").unwrap();
        assert_eq!(service.get(&id).unwrap().appointment_note, None);
    }

    #[test]
    fn display_name_falls_back_to_unknown() {
        let service = service();
        let id = service.create(fields("Ada")).unwrap();

        assert_eq!(service.display_name(&id).unwrap(), "Ada");

        service.delete(&id.to_string()).unwrap();
        assert_eq!(service.display_name(&id).unwrap(), UNKNOWN_PATIENT_NAME);
    }

    #[test]
    fn sparse_documents_decode_to_defaults() {
        let store = Arc::new(MemoryStore::new());
        let id = store
            .insert(COLLECTION, crate::store::Document::new())
            .unwrap();
        let service = PatientService::new(store);

        let patient = service.get(&id.to_string()).unwrap();
        assert_eq!(patient.name, "");
        assert_eq!(patient.billing_balance, Money::ZERO);
        assert_eq!(patient.created_at, DateTime::<Utc>::default());
    }
}
