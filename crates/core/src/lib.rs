//! # Clinic Core
//!
//! Core business logic for the clinic practice-management service.
//!
//! This crate contains the record workflow and nothing else:
//! - Patient registry, appointment book and invoices over a pluggable [`store::RecordStore`]
//! - The invoice payment state machine (`unpaid` -> `paid`)
//! - Hosted-checkout session creation and webhook reconciliation against a
//!   [`payments::PaymentGateway`]
//!
//! **No API concerns**: HTTP servers, routing and response shaping belong in `api-rest`.
//! Configuration is resolved once by the caller and passed in as [`CoreConfig`].

pub mod config;
pub mod constants;
pub mod error;
pub mod payments;
pub mod repositories;
pub mod store;

pub use clinic_types::{EmailAddress, Money, MoneyError, NonEmptyText, TextError};
pub use clinic_uuid::RecordId;
pub use config::CoreConfig;
pub use error::{ClinicError, ClinicResult};
pub use repositories::appointments::{
    Appointment, AppointmentService, AppointmentStatus, AppointmentTime, AppointmentWithPatient,
    NewAppointment,
};
pub use repositories::invoices::{
    Invoice, InvoiceService, InvoiceStatus, LineItem, NewInvoice, PaymentOutcome,
};
pub use repositories::patients::{Patient, PatientFields, PatientService, PatientUpdate};
