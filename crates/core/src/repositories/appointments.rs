//! Appointment book.
//!
//! Appointments are booked against a patient reference that is *not* checked for existence, and
//! there is no overlap or conflict detection. Start and end times are kept exactly as submitted
//! (see [`AppointmentTime`]).

use super::lookup_id;
use crate::repositories::patients::PatientService;
use crate::store::{decode, encode, Collection, RecordStore, SortBy};
use crate::{ClinicError, ClinicResult};
use chrono::{DateTime, Utc};
use clinic_uuid::RecordId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

const COLLECTION: Collection = Collection::Appointments;

/// An appointment time as submitted by the client.
///
/// The value is an opaque string passed through unmodified: no parsing, no time-zone
/// normalisation. Ordering is plain string ordering, which is chronological for the ISO 8601
/// and HTML `datetime-local` forms clients send.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppointmentTime(String);

impl AppointmentTime {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for AppointmentTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Booked,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Booked => f.write_str("booked"),
        }
    }
}

/// A stored appointment. Missing fields decode to their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: RecordId,
    pub patient_id: RecordId,
    #[serde(default)]
    pub start: AppointmentTime,
    #[serde(default)]
    pub end: AppointmentTime,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

/// An appointment annotated with its patient's display name.
#[derive(Clone, Debug, PartialEq)]
pub struct AppointmentWithPatient {
    pub appointment: Appointment,
    pub patient_name: String,
}

/// Booking input.
#[derive(Clone, Debug, Default)]
pub struct NewAppointment {
    pub patient_id: String,
    pub start: String,
    pub end: String,
    pub notes: String,
}

#[derive(Serialize)]
struct NewAppointmentRecord<'a> {
    patient_id: RecordId,
    start: &'a AppointmentTime,
    end: &'a AppointmentTime,
    notes: &'a str,
    status: AppointmentStatus,
    created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AppointmentService {
    store: Arc<dyn RecordStore>,
    patients: PatientService,
}

impl AppointmentService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            patients: PatientService::new(store.clone()),
            store,
        }
    }

    /// Lists every appointment, latest start first, with patient names resolved.
    pub fn list(&self) -> ClinicResult<Vec<AppointmentWithPatient>> {
        let appointments = self.load_sorted()?;
        self.annotate(appointments)
    }

    /// Lists the appointments referencing one patient, latest start first.
    ///
    /// The patient itself does not need to exist.
    pub fn list_for_patient(&self, patient_id: &RecordId) -> ClinicResult<Vec<Appointment>> {
        Ok(self
            .load_sorted()?
            .into_iter()
            .filter(|appointment| appointment.patient_id == *patient_id)
            .collect())
    }

    pub fn get(&self, id: &str) -> ClinicResult<Appointment> {
        let record_id = lookup_id(COLLECTION, id)?;
        self.store
            .find_one(COLLECTION, &record_id)?
            .map(decode::<Appointment>)
            .transpose()?
            .ok_or_else(|| ClinicError::not_found(COLLECTION, record_id))
    }

    /// Books an appointment with status `booked`.
    ///
    /// # Errors
    ///
    /// Returns [`ClinicError::InvalidInput`] if `patient_id` is not a well-formed identifier or
    /// `start` is blank. The patient's existence is not checked.
    pub fn create(&self, input: NewAppointment) -> ClinicResult<RecordId> {
        let patient_id = RecordId::parse(input.patient_id.trim()).map_err(|_| {
            ClinicError::InvalidInput(format!(
                "patient_id is not a valid identifier: '{}'",
                input.patient_id
            ))
        })?;

        let start = AppointmentTime::new(input.start);
        if start.is_empty() {
            return Err(ClinicError::InvalidInput("start time is required".into()));
        }
        let end = AppointmentTime::new(input.end);

        let record = NewAppointmentRecord {
            patient_id,
            start: &start,
            end: &end,
            notes: input.notes.trim(),
            status: AppointmentStatus::Booked,
            created_at: Utc::now(),
        };

        let id = self.store.insert(COLLECTION, encode(&record)?)?;
        tracing::info!("booked appointment {} for patient {}", id, patient_id);
        Ok(id)
    }

    pub fn delete(&self, id: &str) -> ClinicResult<()> {
        let record_id = lookup_id(COLLECTION, id)?;
        if !self.store.delete(COLLECTION, &record_id)? {
            return Err(ClinicError::not_found(COLLECTION, record_id));
        }
        tracing::info!("deleted appointment {}", record_id);
        Ok(())
    }

    fn load_sorted(&self) -> ClinicResult<Vec<Appointment>> {
        let documents = self
            .store
            .find_all(COLLECTION, Some(SortBy::descending("start")))?;

        let mut appointments = Vec::with_capacity(documents.len());
        for document in documents {
            match decode::<Appointment>(document) {
                Ok(appointment) => appointments.push(appointment),
                Err(e) => tracing::warn!("skipping undecodable appointment record: {}", e),
            }
        }
        Ok(appointments)
    }

    fn annotate(&self, appointments: Vec<Appointment>) -> ClinicResult<Vec<AppointmentWithPatient>> {
        let mut names: HashMap<RecordId, String> = HashMap::new();
        let mut annotated = Vec::with_capacity(appointments.len());

        for appointment in appointments {
            let patient_name = match names.get(&appointment.patient_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self.patients.display_name(&appointment.patient_id)?;
                    names.insert(appointment.patient_id, name.clone());
                    name
                }
            };
            annotated.push(AppointmentWithPatient {
                appointment,
                patient_name,
            });
        }

        Ok(annotated)
    }
}
