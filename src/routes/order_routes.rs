// src/routes/order_routes.rs

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    error::ApiError,
    models::{AppState, Order},
    routes::passthrough,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(checkout))
        .route("/order-status", get(order_status))
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CheckoutItem {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub room: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: i64,
    pub procedures: Vec<CheckoutItem>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub success: bool,
    pub orders: Vec<Order>,
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusQuery {
    pub order_id: i64,
}

/* ============================================================
   Handlers
   ============================================================ */

/// One order per selected procedure, created in cart order. Stops at the first failure.
pub async fn checkout(
    State(state): State<AppState>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    if req.user_id <= 0 {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "user_id is required".into(),
        ));
    }
    if req.procedures.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "at least one procedure is required".into(),
        ));
    }

    let mut orders = Vec::with_capacity(req.procedures.len());
    for item in &req.procedures {
        let reply = state
            .n8n
            .post_json(
                "select-procedure",
                &json!({
                    "user_id": req.user_id,
                    "procedure_id": item.id,
                    "room_number": item.room,
                }),
            )
            .await?;

        // Tracking needs every order field, so a partial order counts as a failure.
        let order = match reply.body.get("order").filter(|_| reply.succeeded()) {
            Some(raw) => match serde_json::from_value::<Order>(raw.clone()) {
                Ok(order) => Some(order),
                Err(e) => {
                    tracing::error!(
                        procedure_id = item.id,
                        "select-procedure returned an incomplete order: {e}"
                    );
                    None
                }
            },
            None => None,
        };

        let Some(order) = order else {
            tracing::error!(
                procedure_id = item.id,
                status = %reply.status,
                body = %reply.body,
                "order creation failed"
            );
            let label = if item.name.is_empty() {
                format!("procedure {}", item.id)
            } else {
                item.name.clone()
            };
            return Err(ApiError::BadGateway(
                "ORDER_CREATION_FAILED",
                format!("Failed to create order for {label}."),
            ));
        };

        orders.push(order);
    }

    tracing::info!(user_id = req.user_id, orders = orders.len(), "orders created");

    Ok(Json(CheckoutResponse {
        success: true,
        orders,
    }))
}

pub async fn order_status(
    State(state): State<AppState>,
    Query(q): Query<OrderStatusQuery>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let reply = state.n8n.order_status(q.order_id).await?;
    Ok(passthrough(reply))
}
