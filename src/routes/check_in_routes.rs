// src/routes/check_in_routes.rs

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    coerce::{backend_message, extract_checked_in_user},
    error::ApiError,
    models::{AppState, CheckedInUser},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(check_in).get(check_in_get))
}

/// Profile fields from the patient's Google sign-in (token exchange happens in the browser).
#[derive(Debug, Deserialize, Serialize)]
pub struct CheckInRequest {
    pub google_id: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CheckInResponse {
    pub success: bool,
    pub user: CheckedInUser,
    #[serde(rename = "sessionToken")]
    pub session_token: Option<String>,
}

/// Keeps the route discoverable; check-in is POST only.
pub async fn check_in_get() -> ApiError {
    ApiError::MethodNotAllowed("Method not allowed. Use POST to check in.".into())
}

pub async fn check_in(
    State(state): State<AppState>,
    Json(req): Json<CheckInRequest>,
) -> Result<Json<CheckInResponse>, ApiError> {
    if req.google_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "google_id is required".into(),
        ));
    }

    let reply = state.n8n.post_json("check-in", &json!(req)).await?;

    if !reply.status.is_success() || !reply.succeeded() {
        tracing::error!(status = %reply.status, body = %reply.body, "[check-in] n8n rejected check-in");
    }

    let user = if reply.status.is_success() {
        extract_checked_in_user(&reply.body)
    } else {
        None
    };

    let Some(user) = user else {
        let reason = backend_message(&reply.body).unwrap_or_else(|| "user data was missing".into());
        return Err(ApiError::BadGateway(
            "CHECK_IN_FAILED",
            format!("Check-in failed: {reason}"),
        ));
    };

    let session_token = reply
        .body
        .get("sessionToken")
        .and_then(Value::as_str)
        .map(str::to_string);

    tracing::info!(user_id = user.id, "patient checked in");

    Ok(Json(CheckInResponse {
        success: true,
        user,
        session_token,
    }))
}
