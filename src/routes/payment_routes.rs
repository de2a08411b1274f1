// src/routes/payment_routes.rs

use axum::{Json, Router, body::Bytes, extract::State, http::StatusCode, routing::post};
use serde_json::{Map, Value, json};

use crate::{error::ApiError, models::AppState, routes::passthrough};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_payment))
        .route("/sepay/ipn", post(sepay_ipn))
}

/// Pick the payment workflow and the payload it expects.
///
/// - `payment_method: "bank"`: local bank transfer, marks the order(s) paid;
/// - `order_ids` array: card payment for a whole cart;
/// - otherwise: card payment for a single order.
pub fn payment_dispatch(body: &Value) -> (&'static str, Value) {
    let order_ids = body.get("order_ids").and_then(Value::as_array);

    if body.get("payment_method").and_then(Value::as_str) == Some("bank") {
        let reference = body.get("reference").and_then(Value::as_str).unwrap_or("");
        let payload = match order_ids {
            Some(ids) if !ids.is_empty() => json!({ "order_ids": ids, "reference": reference }),
            _ => json!({
                "order_id": body.get("order_id").cloned().unwrap_or(Value::Null),
                "reference": reference,
            }),
        };
        return ("local-bank-payment", payload);
    }

    let hook = if order_ids.is_some() { "cart-payment" } else { "process-payment" };
    (hook, body.clone())
}

pub async fn submit_payment(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (hook, payload) = payment_dispatch(&body);

    let reply = state.n8n.post_json(hook, &payload).await.map_err(|e| {
        tracing::error!("[payment] proxy error: {e}");
        ApiError::from(e)
    })?;

    if !reply.status.is_success() {
        tracing::error!(hook, status = %reply.status, body = %reply.body, "[payment] n8n error");
    } else {
        tracing::info!(hook, "payment forwarded");
    }

    Ok(passthrough(reply))
}

/// What to do with a SePay payment notification.
#[derive(Debug, PartialEq)]
pub enum IpnAction {
    /// Not a paid-order notification; acknowledged and dropped.
    Ignore,
    /// Payload for the sepay-ipn workflow.
    Forward(Value),
}

/// Validate a SePay IPN body and shape it for the sepay-ipn workflow.
pub fn sepay_ipn_action(payload: &Value) -> Result<IpnAction, ApiError> {
    if !payload.is_object() {
        return Err(ApiError::BadRequest("INVALID_PAYLOAD", "Invalid payload".into()));
    }
    if payload.get("notification_type").and_then(Value::as_str) != Some("ORDER_PAID") {
        return Ok(IpnAction::Ignore);
    }

    let invoice = payload
        .pointer("/order/order_invoice_number")
        .filter(|v| match v {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        })
        .ok_or_else(|| {
            ApiError::BadRequest("VALIDATION_ERROR", "Missing order_invoice_number".into())
        })?;

    let mut forward = Map::new();
    forward.insert("order_invoice_number".into(), invoice.clone());
    for (key, path) in [
        ("order_status", "/order/order_status"),
        ("transaction_id", "/transaction/transaction_id"),
        ("amount", "/order/order_amount"),
        ("currency", "/order/order_currency"),
    ] {
        if let Some(v) = payload.pointer(path) {
            forward.insert(key.into(), v.clone());
        }
    }
    forward.insert("raw".into(), payload.clone());

    Ok(IpnAction::Forward(Value::Object(forward)))
}

/// SePay instant payment notification. Paid orders are handed to n8n to mark them paid.
pub async fn sepay_ipn(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest("INVALID_PAYLOAD", "Invalid payload".into()))?;

    let forward = match sepay_ipn_action(&payload)? {
        IpnAction::Ignore => {
            tracing::debug!(
                notification_type = ?payload.get("notification_type"),
                "[sepay/ipn] ignored"
            );
            return Ok(Json(json!({ "success": true, "message": "Ignored" })));
        }
        IpnAction::Forward(forward) => forward,
    };

    let reply = state.n8n.post_json("sepay-ipn", &forward).await.map_err(|e| {
        tracing::error!("[sepay/ipn] proxy error: {e}");
        ApiError::from(e)
    })?;

    if !reply.status.is_success() {
        tracing::error!(status = %reply.status, body = %reply.body, "[sepay/ipn] n8n error");
        return Err(ApiError::Internal("Processing failed".into()));
    }

    tracing::info!(invoice = %forward["order_invoice_number"], "sepay payment forwarded");
    Ok(Json(json!({ "success": true })))
}
