// src/routes/procedure_routes.rs

use axum::{
    Json, Router,
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
};
use serde_json::{Map, Value};

use crate::{coerce::procedures_from_payload, error::ApiError, models::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_procedures))
}

/// Procedure catalog with `procedures` always a normalized array.
pub async fn list_procedures(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let reply = state
        .n8n
        .get_json("procedures", &[])
        .await
        .map_err(|e| {
            tracing::error!("[procedures] proxy error: {e}");
            ApiError::from(e)
        })?;

    if !reply.status.is_success() {
        tracing::error!(status = %reply.status, body = %reply.body, "[procedures] n8n error");
    }

    let procedures = procedures_from_payload(reply.body.get("procedures").unwrap_or(&Value::Null));
    let procedures = serde_json::to_value(procedures)
        .map_err(|e| ApiError::Internal(format!("serialize error: {e}")))?;

    let mut out = match reply.body {
        Value::Object(obj) => obj,
        _ => Map::new(),
    };
    out.insert("procedures".into(), procedures);

    Ok((
        reply.status,
        [(header::CACHE_CONTROL, "no-store, no-cache, must-revalidate")],
        Json(Value::Object(out)),
    ))
}
