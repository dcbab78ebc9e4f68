//! # API REST
//!
//! REST API for the clinic service.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON shaping, error statuses, CORS, 303 checkout redirects)
//!
//! All record and payment rules live in `clinic-core`; this crate only maps them onto HTTP.

#![warn(rust_2018_idioms)]

pub mod dto;
pub mod error;
pub mod handlers;

use axum::{
    routing::{delete, get, post},
    Router,
};
use clinic_core::payments::{PaymentGateway, PaymentService};
use clinic_core::store::RecordStore;
use clinic_core::{AppointmentService, CoreConfig, InvoiceService, PatientService};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across REST handlers.
///
/// Every service wraps the same injected store.
#[derive(Clone)]
pub struct AppState {
    pub patients: PatientService,
    pub appointments: AppointmentService,
    pub invoices: InvoiceService,
    pub payments: PaymentService,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        gateway: Arc<dyn PaymentGateway>,
        cfg: Arc<CoreConfig>,
    ) -> Self {
        Self {
            patients: PatientService::new(store.clone()),
            appointments: AppointmentService::new(store.clone()),
            invoices: InvoiceService::new(store.clone()),
            payments: PaymentService::new(store, gateway, cfg),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::list_patients,
        handlers::create_patient,
        handlers::get_patient,
        handlers::update_patient,
        handlers::delete_patient,
        handlers::set_appointment_note,
        handlers::set_billing_balance,
        handlers::list_appointments,
        handlers::create_appointment,
        handlers::delete_appointment,
        handlers::list_invoices,
        handlers::create_invoice,
        handlers::get_invoice,
        handlers::pay_invoice,
        handlers::payment_success,
        handlers::payment_cancel,
        handlers::webhook,
    ),
    components(schemas(
        dto::HealthRes,
        dto::CreatedRes,
        dto::PatientRes,
        dto::ListPatientsRes,
        dto::PatientDetailRes,
        dto::CreatePatientReq,
        dto::UpdatePatientReq,
        dto::AppointmentNoteReq,
        dto::BillingReq,
        dto::AppointmentRes,
        dto::ListAppointmentsRes,
        dto::CreateAppointmentReq,
        dto::LineItemRes,
        dto::InvoiceRes,
        dto::ListInvoicesRes,
        dto::CreateInvoiceReq,
        dto::PaymentLandingRes,
        dto::WebhookAckRes,
        error::ErrorBody,
        error::ErrorDetail,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router with Swagger UI mounted at `/swagger-ui`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/patients",
            get(handlers::list_patients).post(handlers::create_patient),
        )
        .route(
            "/patients/:id",
            get(handlers::get_patient)
                .put(handlers::update_patient)
                .delete(handlers::delete_patient),
        )
        .route(
            "/patients/:id/appointment-note",
            post(handlers::set_appointment_note),
        )
        .route("/patients/:id/billing", post(handlers::set_billing_balance))
        .route(
            "/appointments",
            get(handlers::list_appointments).post(handlers::create_appointment),
        )
        .route("/appointments/:id", delete(handlers::delete_appointment))
        .route(
            "/invoices",
            get(handlers::list_invoices).post(handlers::create_invoice),
        )
        .route("/invoices/:id", get(handlers::get_invoice))
        .route("/invoices/:id/pay", get(handlers::pay_invoice))
        .route("/payments/success", get(handlers::payment_success))
        .route("/payments/cancel", get(handlers::payment_cancel))
        .route("/webhook", post(handlers::webhook))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
