use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::models::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub data: HealthData,
}

#[derive(Serialize)]
pub struct HealthData {
    pub ok: bool,
    pub n8n_configured: bool,
    pub tracking_sessions: usize,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        data: HealthData {
            ok: true,
            n8n_configured: state.n8n.is_configured(),
            tracking_sessions: state.tracking.len().await,
        },
    })
}
