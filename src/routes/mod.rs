use crate::models::AppState;
use crate::n8n::UpstreamReply;
use axum::{Json, Router, http::StatusCode};
use serde_json::Value;

pub mod check_in_routes;
pub mod health_routes;
pub mod order_routes;
pub mod payment_routes;
pub mod procedure_routes;
pub mod profile_routes;
pub mod tracking_routes;
pub mod worker_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/check-in", check_in_routes::router())
        .nest("/api/procedures", procedure_routes::router())
        .nest("/api/payment", payment_routes::router())
        .nest("/api/profile", profile_routes::router())
        .nest("/api/worker", worker_routes::router())
        .nest("/api/tracking", tracking_routes::router())
        .nest("/api", order_routes::router())
        .merge(health_routes::router())
        .with_state(state)
}

/// Hand the workflow's status and body straight back to the browser.
pub fn passthrough(reply: UpstreamReply) -> (StatusCode, Json<Value>) {
    (reply.status, Json(reply.body))
}
