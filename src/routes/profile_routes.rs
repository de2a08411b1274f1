// src/routes/profile_routes.rs

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde_json::{Map, Value, json};

use crate::{error::ApiError, models::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(update_profile))
}

fn trimmed_or_null(v: Option<&Value>) -> Value {
    match v {
        Some(Value::String(s)) if !s.trim().is_empty() => Value::String(s.trim().to_string()),
        Some(Value::Null) | None => Value::Null,
        Some(Value::String(_)) => Value::Null,
        Some(other) => Value::String(other.to_string()),
    }
}

/// Validate a profile update and shape it for the update-profile workflow.
pub fn profile_payload(body: &Value) -> Result<Value, ApiError> {
    let user_id = body
        .get("user_id")
        .and_then(Value::as_i64)
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::BadRequest("VALIDATION_ERROR", "user_id required".into()))?;

    let mut payload = Map::new();
    payload.insert("user_id".into(), json!(user_id));
    if let Some(name) = body.get("name").and_then(Value::as_str) {
        payload.insert("name".into(), json!(name));
    }
    payload.insert("birthday".into(), trimmed_or_null(body.get("birthday")));
    // Phone numbers keep their spacing.
    let phone = match body.get("phone") {
        Some(Value::String(s)) => json!(s),
        Some(Value::Null) | None => Value::Null,
        Some(other) => json!(other.to_string()),
    };
    payload.insert("phone".into(), phone);
    payload.insert("address".into(), trimmed_or_null(body.get("address")));

    Ok(Value::Object(payload))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let payload = profile_payload(&body)?;

    let reply = state.n8n.post_json("update-profile", &payload).await?;

    if !reply.status.is_success() || !reply.succeeded() {
        tracing::error!(status = %reply.status, body = %reply.body, "[profile] n8n rejected update");
        let error = reply.body.get("error").filter(|e| !e.is_null()).cloned();
        let out = match error {
            Some(err) => json!({ "success": false, "error": err }),
            None => reply.body,
        };
        return Ok((reply.status, Json(out)));
    }

    Ok((StatusCode::OK, Json(reply.body)))
}
