//! Invoices and the payment state machine.
//!
//! An invoice is derived from an appointment and copies that appointment's patient reference at
//! creation. Afterwards it is immutable apart from one transition:
//!
//! ```text
//! unpaid --(verified checkout completion)--> paid
//! ```
//!
//! [`InvoiceService::mark_paid`] applies that transition idempotently per invoice: a second
//! application finds the invoice already paid and writes nothing.

use super::lookup_id;
use crate::repositories::appointments::AppointmentService;
use crate::store::{decode, encode, Collection, RecordStore};
use crate::{ClinicError, ClinicResult};
use chrono::{DateTime, Utc};
use clinic_types::Money;
use clinic_uuid::RecordId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

const COLLECTION: Collection = Collection::Invoices;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub description: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl LineItem {
    pub fn total(&self) -> ClinicResult<Money> {
        Ok(self.unit_price.times(self.quantity)?)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Unpaid,
    Paid,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceStatus::Unpaid => f.write_str("unpaid"),
            InvoiceStatus::Paid => f.write_str("paid"),
        }
    }
}

/// A stored invoice.
///
/// `appointment_id` and `patient_id` are required; every other missing field decodes to its
/// default (no items, zero total, `unpaid`, no payment metadata).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: RecordId,
    pub appointment_id: RecordId,
    pub patient_id: RecordId,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub total: Money,
    #[serde(default)]
    pub status: InvoiceStatus,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    /// Raw checkout session from the payment provider, kept verbatim once paid.
    #[serde(default)]
    pub payment_session: Option<Value>,
}

impl Invoice {
    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }

    /// Label shown on the hosted checkout page: the first line item's description, or a generic
    /// label naming the invoice.
    pub fn charge_description(&self) -> String {
        self.items
            .first()
            .map(|item| item.description.trim())
            .filter(|description| !description.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Invoice {}", self.id))
    }
}

/// Invoice creation input: a single line item billed against an appointment.
#[derive(Clone, Debug)]
pub struct NewInvoice {
    pub appointment_id: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
}

/// Result of applying the paid transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The invoice moved from `unpaid` to `paid`.
    Applied,
    /// The invoice was already `paid`; nothing was written.
    AlreadyPaid,
}

#[derive(Serialize)]
struct NewInvoiceRecord<'a> {
    appointment_id: RecordId,
    patient_id: RecordId,
    items: &'a [LineItem],
    total: Money,
    status: InvoiceStatus,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct PaidPatch {
    status: InvoiceStatus,
    paid_at: DateTime<Utc>,
    payment_session: Value,
}

#[derive(Clone)]
pub struct InvoiceService {
    store: Arc<dyn RecordStore>,
    appointments: AppointmentService,
}

impl InvoiceService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            appointments: AppointmentService::new(store.clone()),
            store,
        }
    }

    /// Lists every invoice, newest first.
    pub fn list(&self) -> ClinicResult<Vec<Invoice>> {
        let documents = self.store.find_all(COLLECTION, None)?;

        let mut invoices = Vec::with_capacity(documents.len());
        for document in documents {
            match decode::<Invoice>(document) {
                Ok(invoice) => invoices.push(invoice),
                Err(e) => tracing::warn!("skipping undecodable invoice record: {}", e),
            }
        }
        invoices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invoices)
    }

    pub fn get(&self, id: &str) -> ClinicResult<Invoice> {
        let record_id = lookup_id(COLLECTION, id)?;
        self.find(&record_id)?
            .ok_or_else(|| ClinicError::not_found(COLLECTION, record_id))
    }

    /// Creates an unpaid invoice for an appointment with a single line item.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::NotFound`] if the appointment does not exist.
    /// - [`ClinicError::InvalidInput`] if `quantity` is not a positive integer that fits in
    ///   `u32`.
    pub fn create(&self, input: NewInvoice) -> ClinicResult<RecordId> {
        let quantity = u32::try_from(input.quantity)
            .ok()
            .filter(|quantity| *quantity >= 1)
            .ok_or_else(|| {
                ClinicError::InvalidInput(format!(
                    "quantity must be a positive integer, got: {}",
                    input.quantity
                ))
            })?;

        let appointment = self.appointments.get(&input.appointment_id)?;

        let items = vec![LineItem {
            description: input.description.trim().to_string(),
            quantity,
            unit_price: input.unit_price,
        }];
        let total = items
            .iter()
            .try_fold(Money::ZERO, |sum, item| Ok::<_, ClinicError>(sum.checked_add(item.total()?)?))?;

        let record = NewInvoiceRecord {
            appointment_id: appointment.id,
            patient_id: appointment.patient_id,
            items: &items,
            total,
            status: InvoiceStatus::Unpaid,
            created_at: Utc::now(),
        };

        let id = self.store.insert(COLLECTION, encode(&record)?)?;
        tracing::info!(
            "created invoice {} for appointment {} total {}",
            id,
            appointment.id,
            total
        );
        Ok(id)
    }

    pub fn delete(&self, id: &str) -> ClinicResult<()> {
        let record_id = lookup_id(COLLECTION, id)?;
        if !self.store.delete(COLLECTION, &record_id)? {
            return Err(ClinicError::not_found(COLLECTION, record_id));
        }
        tracing::info!("deleted invoice {}", record_id);
        Ok(())
    }

    /// Moves an invoice to `paid`, recording the payment time and the provider's session.
    ///
    /// Safe to call repeatedly for the same invoice: once paid, later calls return
    /// [`PaymentOutcome::AlreadyPaid`] and leave the stored state unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ClinicError::NotFound`] if `id` is malformed or unknown.
    pub fn mark_paid(&self, id: &str, session: Value) -> ClinicResult<PaymentOutcome> {
        let invoice = self.get(id)?;
        if invoice.is_paid() {
            tracing::info!("invoice {} already paid, ignoring repeat completion", invoice.id);
            return Ok(PaymentOutcome::AlreadyPaid);
        }

        let patch = PaidPatch {
            status: InvoiceStatus::Paid,
            paid_at: Utc::now(),
            payment_session: session,
        };
        if !self
            .store
            .update_fields(COLLECTION, &invoice.id, encode(&patch)?)?
        {
            return Err(ClinicError::not_found(COLLECTION, invoice.id));
        }

        tracing::info!("invoice {} marked paid", invoice.id);
        Ok(PaymentOutcome::Applied)
    }

    fn find(&self, id: &RecordId) -> ClinicResult<Option<Invoice>> {
        self.store
            .find_one(COLLECTION, id)?
            .map(decode::<Invoice>)
            .transpose()
    }
}
