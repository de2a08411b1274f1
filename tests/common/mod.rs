#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State},
    http::{Request, Response, StatusCode},
    routing,
};
use serde_json::{Value, json};
use tower::ServiceExt;

use checkin_gateway::{
    models::AppState,
    n8n::N8nClient,
    routes,
    store::MemorySnapshotStore,
    tracking::{TrackerConfig, TrackingRegistry},
};

/// In-process stand-in for the n8n workflows.
#[derive(Default)]
pub struct FakeN8n {
    pub statuses: Mutex<HashMap<i64, String>>,
    pub status_calls: AtomicUsize,
    pub last_payload: Mutex<Option<(String, Value)>>,
}

impl FakeN8n {
    pub fn set_status(&self, order_id: i64, status: &str) {
        self.statuses.lock().unwrap().insert(order_id, status.to_string());
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn last_payload(&self) -> Option<(String, Value)> {
        self.last_payload.lock().unwrap().clone()
    }

    fn record(&self, hook: &str, payload: Value) {
        *self.last_payload.lock().unwrap() = Some((hook.to_string(), payload));
    }
}

pub fn order_json(id: i64, status: &str) -> Value {
    json!({
        "id": id,
        "order_number": format!("20260204-{id:04}"),
        "queue_number": format!("A{id}"),
        "room_number": format!("Room {}", 100 + id),
        "status": status,
        "total_amount": "150000.00",
        "procedure_name": "Blood test"
    })
}

async fn check_in(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["email"] == "taken@example.com" {
        return (
            StatusCode::OK,
            Json(json!({"success": false, "message": "duplicate account"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": {"user": {"id": "7", "email": body["email"], "name": body["name"]}},
            "sessionToken": "tok-7"
        })),
    )
}

async fn procedures() -> Json<Value> {
    Json(json!({
        "success": true,
        "procedures": {
            "0": {"id": 1, "name": "Blood test", "price": "120000", "duration_minutes": 15, "room": "101"},
            "1": {"id": 2, "name": "X-ray", "price": 300000, "duration": 20, "room": "102"},
            "length": 2
        }
    }))
}

async fn select_procedure(
    State(fake): State<Arc<FakeN8n>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let procedure_id = body["procedure_id"].as_i64().unwrap_or_default();
    if procedure_id == 99 {
        return Json(json!({"success": false}));
    }
    if procedure_id == 98 {
        return Json(json!({"success": true, "order": {"id": 980, "status": "pending"}}));
    }
    let order_id = procedure_id * 10;
    fake.set_status(order_id, "pending");
    Json(json!({"success": true, "order": order_json(order_id, "pending")}))
}

async fn order_status(
    State(fake): State<Arc<FakeN8n>>,
    Query(q): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    fake.status_calls.fetch_add(1, Ordering::SeqCst);
    let id: i64 = q.get("order_id").and_then(|s| s.parse().ok()).unwrap_or_default();
    let status = fake.statuses.lock().unwrap().get(&id).cloned();
    match status.as_deref() {
        // Workflow hiccup: empty body.
        Some("broken") => (StatusCode::OK, String::new()),
        Some(status) => (
            StatusCode::OK,
            json!({"success": true, "order": order_json(id, status)}).to_string(),
        ),
        None => (StatusCode::OK, json!({"success": false}).to_string()),
    }
}

async fn worker_orders(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!({"success": true, "orders": [], "filter": q.get("status")}))
}

async fn update_status(State(fake): State<Arc<FakeN8n>>, Json(body): Json<Value>) -> Json<Value> {
    let id = body["order_id"].as_i64().unwrap_or_default();
    let status = body["status"].as_str().unwrap_or_default().to_string();
    fake.set_status(id, &status);
    fake.record("update-status", body);
    Json(json!({"success": true}))
}

fn recorder(hook: &'static str) -> routing::MethodRouter<Arc<FakeN8n>> {
    routing::post(move |State(fake): State<Arc<FakeN8n>>, Json(body): Json<Value>| async move {
        fake.record(hook, body);
        Json(json!({"success": true, "hook": hook}))
    })
}

async fn sepay_ipn(State(fake): State<Arc<FakeN8n>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let failing = body["order_invoice_number"] == "INV-FAIL";
    fake.record("sepay-ipn", body);
    if failing {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"success": false})));
    }
    (StatusCode::OK, Json(json!({"success": true})))
}

async fn update_profile(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["name"] == "fail" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "name rejected", "detail": "x"})),
        );
    }
    (StatusCode::OK, Json(json!({"success": true, "user": body})))
}

/// Start the fake workflows on an ephemeral port; returns the webhook base URL.
pub async fn spawn_fake_n8n() -> (String, Arc<FakeN8n>) {
    let fake = Arc::new(FakeN8n::default());
    let app = Router::new()
        .route("/check-in", routing::post(check_in))
        .route("/procedures", routing::get(procedures))
        .route("/select-procedure", routing::post(select_procedure))
        .route("/order-status", routing::get(order_status))
        .route("/worker-orders", routing::get(worker_orders))
        .route("/update-status", routing::post(update_status))
        .route("/update-profile", routing::post(update_profile))
        .route("/local-bank-payment", recorder("local-bank-payment"))
        .route("/cart-payment", recorder("cart-payment"))
        .route("/process-payment", recorder("process-payment"))
        .route("/sepay-ipn", routing::post(sepay_ipn))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), fake)
}

pub fn test_state(base_url: Option<String>, poll_interval: Duration) -> AppState {
    AppState {
        n8n: N8nClient::new(base_url, Duration::from_secs(5)).unwrap(),
        tracking: Arc::new(TrackingRegistry::new()),
        snapshots: Arc::new(MemorySnapshotStore::new()),
        tracker_config: TrackerConfig::with_interval(poll_interval),
    }
}

pub async fn test_app(poll_interval: Duration) -> (Router, AppState, Arc<FakeN8n>) {
    let (base, fake) = spawn_fake_n8n().await;
    let state = test_state(Some(base), poll_interval);
    (routes::router(state.clone()), state, fake)
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp: Response<Body> = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn with_bearer(mut req: Request<Body>, token: &str) -> Request<Body> {
    req.headers_mut()
        .insert("authorization", format!("Bearer {token}").parse().unwrap());
    req
}

pub fn bare(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}
