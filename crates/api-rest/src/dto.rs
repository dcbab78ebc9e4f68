//! Request and response bodies for the REST surface.
//!
//! These are the OpenAPI-documented shapes; they convert from the core record types so handlers
//! never hand core types straight to the wire.

use chrono::{DateTime, Utc};
use clinic_core::{
    Appointment, AppointmentWithPatient, Invoice, LineItem, Money, NewAppointment, NewInvoice,
    Patient, PatientFields, PatientUpdate,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatedRes {
    pub id: String,
}

// Patients

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PatientRes {
    pub id: String,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub appointment_note: Option<String>,
    #[schema(value_type = String, example = "0.00")]
    pub billing_balance: Money,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl From<Patient> for PatientRes {
    fn from(p: Patient) -> Self {
        Self {
            id: p.id.to_string(),
            name: p.name,
            address: p.address,
            phone: p.phone,
            email: p.email,
            appointment_note: p.appointment_note,
            billing_balance: p.billing_balance,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListPatientsRes {
    pub patients: Vec<PatientRes>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PatientDetailRes {
    pub patient: PatientRes,
    pub appointments: Vec<AppointmentRes>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct CreatePatientReq {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
}

impl From<CreatePatientReq> for PatientFields {
    fn from(req: CreatePatientReq) -> Self {
        Self {
            name: req.name,
            address: req.address,
            phone: req.phone,
            email: req.email,
        }
    }
}

/// Partial patient update; absent fields are left unchanged.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdatePatientReq {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl From<UpdatePatientReq> for PatientUpdate {
    fn from(req: UpdatePatientReq) -> Self {
        Self {
            name: req.name,
            address: req.address,
            phone: req.phone,
            email: req.email,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct AppointmentNoteReq {
    /// Blank or absent clears the note.
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BillingReq {
    #[schema(value_type = String, example = "120.50")]
    pub amount: Money,
}

// Appointments

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AppointmentRes {
    pub id: String,
    pub patient_id: String,
    /// Present in listings; resolves to "Unknown" when the patient no longer exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    pub start: String,
    pub end: String,
    pub notes: String,
    pub status: String,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl From<Appointment> for AppointmentRes {
    fn from(a: Appointment) -> Self {
        Self {
            id: a.id.to_string(),
            patient_id: a.patient_id.to_string(),
            patient_name: None,
            start: a.start.to_string(),
            end: a.end.to_string(),
            notes: a.notes,
            status: a.status.to_string(),
            created_at: a.created_at,
        }
    }
}

impl From<AppointmentWithPatient> for AppointmentRes {
    fn from(a: AppointmentWithPatient) -> Self {
        Self {
            patient_name: Some(a.patient_name),
            ..Self::from(a.appointment)
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListAppointmentsRes {
    pub appointments: Vec<AppointmentRes>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateAppointmentReq {
    pub patient_id: String,
    #[schema(example = "2026-05-01T09:00")]
    pub start: String,
    #[serde(default)]
    pub end: String,
    #[serde(default)]
    pub notes: String,
}

impl From<CreateAppointmentReq> for NewAppointment {
    fn from(req: CreateAppointmentReq) -> Self {
        Self {
            patient_id: req.patient_id,
            start: req.start,
            end: req.end,
            notes: req.notes,
        }
    }
}

// Invoices

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LineItemRes {
    pub description: String,
    pub quantity: u32,
    #[schema(value_type = String)]
    pub unit_price: Money,
}

impl From<LineItem> for LineItemRes {
    fn from(item: LineItem) -> Self {
        Self {
            description: item.description,
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InvoiceRes {
    pub id: String,
    pub appointment_id: String,
    pub patient_id: String,
    pub items: Vec<LineItemRes>,
    #[schema(value_type = String, example = "75.00")]
    pub total: Money,
    pub status: String,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = Option<String>)]
    pub paid_at: Option<DateTime<Utc>>,
    /// Provider checkout session recorded when the invoice was paid.
    #[schema(value_type = Option<Object>)]
    pub payment_session: Option<Value>,
}

impl From<Invoice> for InvoiceRes {
    fn from(i: Invoice) -> Self {
        Self {
            id: i.id.to_string(),
            appointment_id: i.appointment_id.to_string(),
            patient_id: i.patient_id.to_string(),
            items: i.items.into_iter().map(LineItemRes::from).collect(),
            total: i.total,
            status: i.status.to_string(),
            created_at: i.created_at,
            paid_at: i.paid_at,
            payment_session: i.payment_session,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListInvoicesRes {
    pub invoices: Vec<InvoiceRes>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateInvoiceReq {
    pub appointment_id: String,
    #[serde(default)]
    pub description: String,
    pub quantity: i64,
    #[schema(value_type = String, example = "25.00")]
    pub unit_price: Money,
}

impl From<CreateInvoiceReq> for NewInvoice {
    fn from(req: CreateInvoiceReq) -> Self {
        Self {
            appointment_id: req.appointment_id,
            description: req.description,
            quantity: req.quantity,
            unit_price: req.unit_price,
        }
    }
}

// Payments

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaymentReturnQuery {
    pub invoice_id: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentLandingRes {
    pub invoice_id: Option<String>,
    pub session_id: Option<String>,
    /// Current invoice status, when the invoice is known.
    pub status: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAckRes {
    pub received: bool,
    /// What the delivery did: `applied`, `already_paid`, `unknown_invoice`,
    /// `missing_invoice_metadata` or `ignored`.
    pub outcome: String,
}
