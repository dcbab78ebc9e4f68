//! Route handlers.
//!
//! Record operations are short synchronous store calls and run inline. The checkout round trip
//! blocks on the payment provider, so it is moved onto tokio's blocking pool.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Json, Redirect},
};
use chrono::Utc;
use clinic_core::payments::WebhookOutcome;
use clinic_core::{ClinicError, InvoiceStatus};

use crate::dto::{
    AppointmentNoteReq, AppointmentRes, BillingReq, CreateAppointmentReq, CreateInvoiceReq,
    CreatePatientReq, CreatedRes, HealthRes, InvoiceRes, ListAppointmentsRes, ListInvoicesRes,
    ListPatientsRes, PatientDetailRes, PatientRes, PaymentLandingRes, PaymentReturnQuery,
    UpdatePatientReq, WebhookAckRes,
};
use crate::error::{ApiError, ApiJson, ApiResult, ErrorBody};
use crate::AppState;

/// Header carrying the provider's webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Liveness check.
pub async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Clinic REST API is alive".into(),
    })
}

// ---------------------------------------------------------------------------
// Patients
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/patients",
    responses(
        (status = 200, description = "Patients ordered by name", body = ListPatientsRes),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
/// List all patients, ordered by name.
#[axum::debug_handler]
pub async fn list_patients(State(state): State<AppState>) -> ApiResult<Json<ListPatientsRes>> {
    let patients = state
        .patients
        .list()?
        .into_iter()
        .map(PatientRes::from)
        .collect();
    Ok(Json(ListPatientsRes { patients }))
}

#[utoipa::path(
    post,
    path = "/patients",
    request_body = CreatePatientReq,
    responses(
        (status = 201, description = "Patient registered", body = CreatedRes),
        (status = 422, description = "Missing name or malformed email", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
/// Register a new patient.
///
/// Every field is trimmed. `name` is required; `email` must look like an address when given.
#[axum::debug_handler]
pub async fn create_patient(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreatePatientReq>,
) -> ApiResult<(StatusCode, Json<CreatedRes>)> {
    let id = state.patients.create(req.into())?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedRes { id: id.to_string() }),
    ))
}

#[utoipa::path(
    get,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "Patient with their appointments", body = PatientDetailRes),
        (status = 404, description = "Patient not found", body = ErrorBody)
    )
)]
/// Fetch one patient together with the appointments that reference them.
pub async fn get_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PatientDetailRes>> {
    let patient = state.patients.get(&id)?;
    let appointments = state
        .appointments
        .list_for_patient(&patient.id)?
        .into_iter()
        .map(AppointmentRes::from)
        .collect();
    Ok(Json(PatientDetailRes {
        patient: patient.into(),
        appointments,
    }))
}

#[utoipa::path(
    put,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient identifier")),
    request_body = UpdatePatientReq,
    responses(
        (status = 200, description = "Updated patient", body = PatientRes),
        (status = 404, description = "Patient not found", body = ErrorBody),
        (status = 422, description = "Invalid field value", body = ErrorBody)
    )
)]
/// Replace any of a patient's contact fields.
pub async fn update_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdatePatientReq>,
) -> ApiResult<Json<PatientRes>> {
    state.patients.update(&id, req.into())?;
    Ok(Json(state.patients.get(&id)?.into()))
}

#[utoipa::path(
    delete,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 204, description = "Patient deleted"),
        (status = 404, description = "Patient not found", body = ErrorBody)
    )
)]
/// Delete a patient. Appointments and invoices that reference them are left in place.
pub async fn delete_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.patients.delete(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/patients/{id}/appointment-note",
    params(("id" = String, Path, description = "Patient identifier")),
    request_body = AppointmentNoteReq,
    responses(
        (status = 200, description = "Updated patient", body = PatientRes),
        (status = 404, description = "Patient not found", body = ErrorBody)
    )
)]
/// Set the free-text appointment note kept on the patient record.
pub async fn set_appointment_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<AppointmentNoteReq>,
) -> ApiResult<Json<PatientRes>> {
    state.patients.set_appointment_note(&id, &req.note)?;
    Ok(Json(state.patients.get(&id)?.into()))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/billing",
    params(("id" = String, Path, description = "Patient identifier")),
    request_body = BillingReq,
    responses(
        (status = 200, description = "Updated patient", body = PatientRes),
        (status = 404, description = "Patient not found", body = ErrorBody),
        (status = 422, description = "Negative or malformed amount", body = ErrorBody)
    )
)]
/// Set the flat billing balance kept on the patient record.
pub async fn set_billing_balance(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<BillingReq>,
) -> ApiResult<Json<PatientRes>> {
    state.patients.set_billing_balance(&id, req.amount)?;
    Ok(Json(state.patients.get(&id)?.into()))
}

// ---------------------------------------------------------------------------
// Appointments
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/appointments",
    responses(
        (status = 200, description = "Appointments, latest start first", body = ListAppointmentsRes),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
/// List all appointments with their patient names.
#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppState>,
) -> ApiResult<Json<ListAppointmentsRes>> {
    let appointments = state
        .appointments
        .list()?
        .into_iter()
        .map(AppointmentRes::from)
        .collect();
    Ok(Json(ListAppointmentsRes { appointments }))
}

#[utoipa::path(
    post,
    path = "/appointments",
    request_body = CreateAppointmentReq,
    responses(
        (status = 201, description = "Appointment booked", body = CreatedRes),
        (status = 422, description = "Malformed patient id or missing start", body = ErrorBody)
    )
)]
/// Book an appointment. The patient reference is not checked for existence.
pub async fn create_appointment(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateAppointmentReq>,
) -> ApiResult<(StatusCode, Json<CreatedRes>)> {
    let id = state.appointments.create(req.into())?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedRes { id: id.to_string() }),
    ))
}

#[utoipa::path(
    delete,
    path = "/appointments/{id}",
    params(("id" = String, Path, description = "Appointment identifier")),
    responses(
        (status = 204, description = "Appointment deleted"),
        (status = 404, description = "Appointment not found", body = ErrorBody)
    )
)]
pub async fn delete_appointment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.appointments.delete(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Invoices
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/invoices",
    responses(
        (status = 200, description = "Invoices, newest first", body = ListInvoicesRes),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn list_invoices(State(state): State<AppState>) -> ApiResult<Json<ListInvoicesRes>> {
    let invoices = state
        .invoices
        .list()?
        .into_iter()
        .map(InvoiceRes::from)
        .collect();
    Ok(Json(ListInvoicesRes { invoices }))
}

#[utoipa::path(
    post,
    path = "/invoices",
    request_body = CreateInvoiceReq,
    responses(
        (status = 201, description = "Invoice created", body = CreatedRes),
        (status = 404, description = "Appointment not found", body = ErrorBody),
        (status = 422, description = "Invalid quantity or price", body = ErrorBody)
    )
)]
/// Create an unpaid invoice for an appointment with a single line item.
#[axum::debug_handler]
pub async fn create_invoice(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateInvoiceReq>,
) -> ApiResult<(StatusCode, Json<CreatedRes>)> {
    let id = state.invoices.create(req.into())?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedRes { id: id.to_string() }),
    ))
}

#[utoipa::path(
    get,
    path = "/invoices/{id}",
    params(("id" = String, Path, description = "Invoice identifier")),
    responses(
        (status = 200, description = "Invoice", body = InvoiceRes),
        (status = 404, description = "Invoice not found", body = ErrorBody)
    )
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<InvoiceRes>> {
    Ok(Json(state.invoices.get(&id)?.into()))
}

#[utoipa::path(
    get,
    path = "/invoices/{id}/pay",
    params(("id" = String, Path, description = "Invoice identifier")),
    responses(
        (status = 303, description = "Redirect to the hosted checkout page"),
        (status = 404, description = "Invoice not found", body = ErrorBody),
        (status = 409, description = "Invoice already paid", body = ErrorBody),
        (status = 502, description = "Payment gateway failure", body = ErrorBody)
    )
)]
/// Start a hosted checkout for an unpaid invoice and redirect the payer to it.
pub async fn pay_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Redirect> {
    let payments = state.payments.clone();
    let session = tokio::task::spawn_blocking(move || payments.request_payment(&id))
        .await
        .map_err(|e| ApiError::Internal(format!("checkout task failed: {}", e)))??;
    Ok(Redirect::to(&session.redirect_url))
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/payments/success",
    params(PaymentReturnQuery),
    responses(
        (status = 200, description = "Return page after checkout", body = PaymentLandingRes)
    )
)]
/// Landing point after a completed checkout.
///
/// The invoice only becomes `paid` once the webhook arrives, so the reported status may still be
/// `unpaid`.
pub async fn payment_success(
    State(state): State<AppState>,
    Query(query): Query<PaymentReturnQuery>,
) -> ApiResult<Json<PaymentLandingRes>> {
    let status = match query.invoice_id.as_deref() {
        Some(id) => match state.invoices.get(id) {
            Ok(invoice) => Some(invoice.status),
            Err(ClinicError::NotFound { .. }) => None,
            Err(e) => return Err(e.into()),
        },
        None => None,
    };
    let message = match status {
        Some(InvoiceStatus::Paid) => "Payment received. The invoice is paid.",
        Some(InvoiceStatus::Unpaid) => {
            "Payment received. The invoice will be marked paid once the payment is confirmed."
        }
        None => "Payment received.",
    };
    Ok(Json(PaymentLandingRes {
        invoice_id: query.invoice_id,
        session_id: query.session_id,
        status: status.map(|s| s.to_string()),
        message: message.to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/payments/cancel",
    params(PaymentReturnQuery),
    responses(
        (status = 200, description = "Return page after an abandoned checkout", body = PaymentLandingRes)
    )
)]
/// Landing point after the payer abandons checkout. The invoice stays unpaid.
pub async fn payment_cancel(Query(query): Query<PaymentReturnQuery>) -> Json<PaymentLandingRes> {
    Json(PaymentLandingRes {
        invoice_id: query.invoice_id,
        session_id: None,
        status: None,
        message: "Payment cancelled. The invoice has not been charged.".to_string(),
    })
}

#[utoipa::path(
    post,
    path = "/webhook",
    request_body(content = String, description = "Raw provider event payload", content_type = "application/json"),
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookAckRes),
        (status = 400, description = "Bad signature or malformed event", body = ErrorBody)
    )
)]
/// Receive a payment provider event.
///
/// The body is read raw because the signature covers the exact bytes delivered.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAckRes>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = state
        .payments
        .handle_webhook(&body, signature, Utc::now())
        .map_err(|e| {
            tracing::warn!("rejected webhook delivery: {}", e);
            ApiError::from(e)
        })?;

    let outcome = match outcome {
        WebhookOutcome::Applied { .. } => "applied",
        WebhookOutcome::AlreadyPaid { .. } => "already_paid",
        WebhookOutcome::UnknownInvoice { .. } => "unknown_invoice",
        WebhookOutcome::MissingInvoiceMetadata => "missing_invoice_metadata",
        WebhookOutcome::Ignored { .. } => "ignored",
    };
    Ok(Json(WebhookAckRes {
        received: true,
        outcome: outcome.to_string(),
    }))
}
