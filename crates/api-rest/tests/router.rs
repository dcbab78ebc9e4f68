use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use api_rest::{router, AppState};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use clinic_core::payments::{
    CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway, UnconfiguredGateway,
};
use clinic_core::store::{FileStore, MemoryStore, RecordStore};
use clinic_core::CoreConfig;
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sha2::Sha256;
use tower::ServiceExt;

const WEBHOOK_SECRET: &str = "whsec_router_test";

#[derive(Default)]
struct RecordingGateway {
    requests: Mutex<Vec<CheckoutRequest>>,
}

impl RecordingGateway {
    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl PaymentGateway for RecordingGateway {
    fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(CheckoutSession {
            session_id: "cs_test_router".into(),
            redirect_url: "https://checkout.example.com/pay/cs_test_router".into(),
        })
    }
}

fn config(secret: Option<&str>) -> Arc<CoreConfig> {
    Arc::new(
        CoreConfig::new(
            PathBuf::from("unused"),
            "http://localhost:3000",
            "usd",
            secret.map(str::to_string),
        )
        .unwrap(),
    )
}

fn test_app(secret: Option<&str>) -> (Router, Arc<RecordingGateway>) {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let gateway = Arc::new(RecordingGateway::default());
    let app = router(AppState::new(store, gateway.clone(), config(secret)));
    (app, gateway)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn webhook_request(payload: &str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header("Stripe-Signature", signature);
    }
    builder.body(Body::from(payload.to_string())).unwrap()
}

fn sign(payload: &str, secret: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn create(app: &Router, uri: &str, body: Value) -> String {
    let (status, body) = send(app, json_request("POST", uri, body)).await;
    assert_eq!(status, StatusCode::CREATED, "POST {uri}: {body}");
    body["id"].as_str().unwrap().to_string()
}

/// Registers a patient, books an appointment and bills 3 x 25.00 against it.
async fn seeded_invoice(app: &Router) -> String {
    let patient_id = create(app, "/patients", json!({"name": "Ada Lovelace"})).await;
    let appointment_id = create(
        app,
        "/appointments",
        json!({"patient_id": patient_id, "start": "2026-05-01T09:00", "end": "2026-05-01T09:30"}),
    )
    .await;
    create(
        app,
        "/invoices",
        json!({
            "appointment_id": appointment_id,
            "description": "Consultation",
            "quantity": 3,
            "unit_price": "25.00"
        }),
    )
    .await
}

fn completed_event(invoice_id: &str) -> String {
    json!({
        "id": "evt_router",
        "type": "checkout.session.completed",
        "data": {"object": {
            "id": "cs_test_router",
            "metadata": {"invoice_id": invoice_id},
            "payment_status": "paid",
            "amount_total": 7500
        }}
    })
    .to_string()
}

#[tokio::test]
async fn health_is_alive() {
    let (app, _) = test_app(None);
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (app, _) = test_app(None);
    let (status, body) = send(&app, get("/api-docs/openapi.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/invoices/{id}/pay"].is_object());
}

#[tokio::test]
async fn patient_lifecycle() {
    let (app, _) = test_app(None);

    let id = create(
        &app,
        "/patients",
        json!({"name": "  Grace Hopper ", "email": "grace@example.com", "phone": "555-0100"}),
    )
    .await;
    create(&app, "/patients", json!({"name": "Ada Lovelace"})).await;

    let (status, body) = send(&app, get(&format!("/patients/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["patient"]["name"], "Grace Hopper");
    assert_eq!(body["patient"]["email"], "grace@example.com");
    assert_eq!(body["appointments"], json!([]));

    let (_, body) = send(&app, get("/patients")).await;
    let names: Vec<_> = body["patients"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["Ada Lovelace", "Grace Hopper"]);

    let (status, body) = send(
        &app,
        json_request("PUT", &format!("/patients/{id}"), json!({"phone": "555-0199"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phone"], "555-0199");
    assert_eq!(body["name"], "Grace Hopper");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/patients/{id}/billing"),
            json!({"amount": "120.50"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["billing_balance"], "120.50");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/patients/{id}/appointment-note"),
            json!({"note": "Prefers mornings"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment_note"], "Prefers mornings");

    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/patients/{id}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, get(&format!("/patients/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn patient_validation_errors_are_structured() {
    let (app, _) = test_app(None);

    let (status, body) = send(&app, json_request("POST", "/patients", json!({"name": "  "}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/patients",
            json!({"name": "Ada", "email": "not-an-address"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&app, get("/patients/not-an-id")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn orphaned_appointment_lists_unknown_patient() {
    let (app, _) = test_app(None);
    let patient_id = create(&app, "/patients", json!({"name": "Ada"})).await;
    create(
        &app,
        "/appointments",
        json!({"patient_id": patient_id, "start": "2026-05-01T09:00"}),
    )
    .await;

    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/patients/{patient_id}"))
        .body(Body::empty())
        .unwrap();
    send(&app, req).await;

    let (status, body) = send(&app, get("/appointments")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointments"][0]["patient_name"], "Unknown");
    assert_eq!(body["appointments"][0]["status"], "booked");
}

#[tokio::test]
async fn invoice_requires_existing_appointment() {
    let (app, _) = test_app(None);
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/invoices",
            json!({
                "appointment_id": "0123456789abcdef0123456789abcdef",
                "quantity": 1,
                "unit_price": "10.00"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rejected_request_bodies_are_structured() {
    let (app, _) = test_app(None);
    let patient_id = create(&app, "/patients", json!({"name": "Ada"})).await;
    let appointment_id = create(
        &app,
        "/appointments",
        json!({"patient_id": patient_id, "start": "2026-05-01T09:00"}),
    )
    .await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/invoices",
            json!({"appointment_id": appointment_id, "quantity": 1, "unit_price": "-5"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/invoices",
            json!({"appointment_id": appointment_id, "quantity": 1.5, "unit_price": "5"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/patients/{patient_id}/billing"),
            json!({"amount": "-1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");

    let malformed = Request::builder()
        .method("POST")
        .uri("/patients")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (_, invoices) = send(&app, get("/invoices")).await;
    assert_eq!(invoices["invoices"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn pay_redirects_to_hosted_checkout() {
    let (app, gateway) = test_app(None);
    let invoice_id = seeded_invoice(&app).await;

    let (_, invoice) = send(&app, get(&format!("/invoices/{invoice_id}"))).await;
    assert_eq!(invoice["total"], "75.00");
    assert_eq!(invoice["status"], "unpaid");

    let response = app
        .clone()
        .oneshot(get(&format!("/invoices/{invoice_id}/pay")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://checkout.example.com/pay/cs_test_router"
    );

    let requests = gateway.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].unit_amount, 7500);
    assert_eq!(requests[0].quantity, 1);
    assert_eq!(
        requests[0].cancel_url,
        format!("http://localhost:3000/payments/cancel?invoice_id={invoice_id}")
    );
}

#[tokio::test]
async fn pay_unknown_invoice_is_not_found_without_gateway_call() {
    let (app, gateway) = test_app(None);
    let (status, _) = send(
        &app,
        get("/invoices/0123456789abcdef0123456789abcdef/pay"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(gateway.calls(), 0);
}

#[tokio::test]
async fn unconfigured_gateway_is_bad_gateway() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let app = router(AppState::new(
        store,
        Arc::new(UnconfiguredGateway),
        config(None),
    ));
    let invoice_id = seeded_invoice(&app).await;

    let (status, body) = send(&app, get(&format!("/invoices/{invoice_id}/pay"))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "GATEWAY_ERROR");
}

#[tokio::test]
async fn signed_webhook_marks_invoice_paid_and_blocks_repayment() {
    let (app, gateway) = test_app(Some(WEBHOOK_SECRET));
    let invoice_id = seeded_invoice(&app).await;
    let payload = completed_event(&invoice_id);

    let (status, body) = send(
        &app,
        webhook_request(&payload, Some(sign(&payload, WEBHOOK_SECRET))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "applied");

    let (status, body) = send(
        &app,
        webhook_request(&payload, Some(sign(&payload, WEBHOOK_SECRET))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "already_paid");

    let (_, invoice) = send(&app, get(&format!("/invoices/{invoice_id}"))).await;
    assert_eq!(invoice["status"], "paid");
    assert!(invoice["paid_at"].is_string());
    assert_eq!(invoice["payment_session"]["id"], "cs_test_router");

    let (status, body) = send(&app, get(&format!("/invoices/{invoice_id}/pay"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
    assert_eq!(gateway.calls(), 0);

    let (status, body) = send(
        &app,
        get(&format!(
            "/payments/success?invoice_id={invoice_id}&session_id=cs_test_router"
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paid");
}

#[tokio::test]
async fn webhook_with_bad_signature_is_rejected_without_mutation() {
    let (app, _) = test_app(Some(WEBHOOK_SECRET));
    let invoice_id = seeded_invoice(&app).await;
    let payload = completed_event(&invoice_id);

    let (status, body) = send(
        &app,
        webhook_request(&payload, Some(sign(&payload, "whsec_attacker"))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, _) = send(&app, webhook_request(&payload, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, invoice) = send(&app, get(&format!("/invoices/{invoice_id}"))).await;
    assert_eq!(invoice["status"], "unpaid");
}

#[tokio::test]
async fn unrecognised_webhook_is_acknowledged() {
    let (app, _) = test_app(None);
    let invoice_id = seeded_invoice(&app).await;

    let payload = json!({"id": "evt_other", "type": "customer.created", "data": {"object": {}}})
        .to_string();
    let (status, body) = send(&app, webhook_request(&payload, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ignored");

    let (status, _) = send(&app, webhook_request("not json", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, invoice) = send(&app, get(&format!("/invoices/{invoice_id}"))).await;
    assert_eq!(invoice["status"], "unpaid");
}

#[tokio::test]
async fn cancel_landing_leaves_invoice_unpaid() {
    let (app, _) = test_app(None);
    let invoice_id = seeded_invoice(&app).await;

    let (status, body) = send(
        &app,
        get(&format!("/payments/cancel?invoice_id={invoice_id}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["invoice_id"], invoice_id);

    let (_, invoice) = send(&app, get(&format!("/invoices/{invoice_id}"))).await;
    assert_eq!(invoice["status"], "unpaid");
}

#[tokio::test]
async fn file_store_backs_the_router() {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let store: Arc<dyn RecordStore> = Arc::new(FileStore::new(temp_dir.path()).unwrap());
    let app = router(AppState::new(
        store.clone(),
        Arc::new(RecordingGateway::default()),
        config(None),
    ));

    let invoice_id = seeded_invoice(&app).await;

    let reopened: Arc<dyn RecordStore> = Arc::new(FileStore::new(temp_dir.path()).unwrap());
    let app = router(AppState::new(
        reopened,
        Arc::new(RecordingGateway::default()),
        config(None),
    ));
    let (status, body) = send(&app, get("/invoices")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["invoices"][0]["id"], invoice_id);
    assert_eq!(body["invoices"][0]["total"], "75.00");
}
