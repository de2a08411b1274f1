use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::n8n::UpstreamError;
use crate::tracking::TrackingError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    MethodNotAllowed(String),
    BadGateway(&'static str, String),
    Internal(String),
}

impl ApiError {
    pub fn missing_session() -> Self {
        ApiError::Unauthorized("MISSING_SESSION", "Bearer session token required".into())
    }

    pub fn tracking_not_found() -> Self {
        ApiError::NotFound("TRACKING_NOT_FOUND", "Tracking session not found".into())
    }

    fn to_error_response(code: &str, message: &str) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
            },
        })
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::NotConfigured => {
                ApiError::Internal("N8N webhook URL not configured".into())
            }
            other => ApiError::BadGateway("UPSTREAM_UNAVAILABLE", other.to_string()),
        }
    }
}

impl From<TrackingError> for ApiError {
    fn from(err: TrackingError) -> Self {
        match err {
            TrackingError::NoOrders => ApiError::BadRequest(
                "VALIDATION_ERROR",
                "at least one order is required to start tracking".into(),
            ),
            TrackingError::UnknownOrder(id) => ApiError::NotFound(
                "ORDER_NOT_TRACKED",
                format!("order {id} is not tracked in this session"),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(code, msg) => {
                (StatusCode::UNAUTHORIZED, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::BadRequest(code, msg) => {
                (StatusCode::BAD_REQUEST, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::NotFound(code, msg) => {
                (StatusCode::NOT_FOUND, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::MethodNotAllowed(msg) => (
                StatusCode::METHOD_NOT_ALLOWED,
                ApiError::to_error_response("METHOD_NOT_ALLOWED", &msg),
            )
                .into_response(),
            ApiError::BadGateway(code, msg) => {
                (StatusCode::BAD_GATEWAY, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::to_error_response("INTERNAL", &msg),
            )
                .into_response(),
        }
    }
}
