// src/routes/worker_routes.rs
//
// Staff dashboard: order queue and status changes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    error::ApiError,
    models::{AppState, OrderStatus},
    routes::passthrough,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/{order_id}/status", post(update_order_status))
}

#[derive(Debug, Deserialize)]
pub struct WorkerOrdersQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub worker_id: i64,
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(q): Query<WorkerOrdersQuery>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let query: Vec<(&str, String)> = match q.status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => Vec::new(),
        Some(status) => vec![("status", status.to_string())],
    };

    let reply = state.n8n.get_json("worker-orders", &query).await?;
    if !reply.status.is_success() {
        tracing::error!(status = %reply.status, "[worker-orders] n8n error");
    }
    Ok(passthrough(reply))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if !req.status.is_known() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("unknown status: {}", req.status),
        ));
    }
    if req.worker_id <= 0 {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "worker_id is required".into(),
        ));
    }

    let reply = state
        .n8n
        .post_json(
            "update-status",
            &json!({
                "order_id": order_id,
                "status": req.status,
                "worker_id": req.worker_id,
            }),
        )
        .await?;

    if reply.succeeded() {
        tracing::info!(order_id, status = %req.status, worker_id = req.worker_id, "order status updated");
    } else {
        tracing::warn!(order_id, status = %reply.status, body = %reply.body, "order status update rejected");
    }

    Ok(passthrough(reply))
}
