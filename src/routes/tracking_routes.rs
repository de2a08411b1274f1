// src/routes/tracking_routes.rs
//
// Patient-side order tracking. Every route is scoped to the bearer's session.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::patient_session::PatientSession,
    models::{ApiOk, AppState, OkData, Order, OrderView},
    store::SnapshotStore,
    tracking::{Announcement, OrderStatusSource, TrackingSummary},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_tracking))
        .route("/resume", post(resume_tracking))
        .route("/persisted", delete(forget_tracking))
        .route("/{tracking_id}", get(get_tracking).delete(stop_tracking))
        .route("/{tracking_id}/announcements", get(drain_announcements))
        .route(
            "/{tracking_id}/orders/{order_id}/announce",
            post(replay_announcement),
        )
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct StartTrackingRequest {
    pub orders: Vec<Order>,
}

#[derive(Debug, Serialize)]
pub struct TrackingDto {
    pub tracking_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub orders: Vec<OrderView>,
    pub pending_announcements: usize,
}

impl From<TrackingSummary> for TrackingDto {
    fn from(s: TrackingSummary) -> Self {
        TrackingDto {
            tracking_id: s.tracking_id,
            started_at: s.started_at,
            orders: s.orders.into_iter().map(OrderView::from).collect(),
            pending_announcements: s.pending_announcements,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReplayDto {
    pub order_id: i64,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ForgetDto {
    pub stopped_sessions: usize,
}

/* ============================================================
   Helpers
   ============================================================ */

async fn begin(
    state: &AppState,
    session: &PatientSession,
    orders: Vec<Order>,
) -> Result<TrackingDto, ApiError> {
    let source: Arc<dyn OrderStatusSource> = Arc::new(state.n8n.clone());
    let summary = state
        .tracking
        .start(
            &session.key,
            orders,
            source,
            state.snapshots.clone(),
            state.tracker_config,
        )
        .await?;
    Ok(summary.into())
}

/* ============================================================
   Handlers
   ============================================================ */

/// Start tracking freshly paid orders and remember them for a later resume.
/// Replaces any session the patient already had.
pub async fn start_tracking(
    State(state): State<AppState>,
    session: PatientSession,
    Json(req): Json<StartTrackingRequest>,
) -> Result<Json<ApiOk<TrackingDto>>, ApiError> {
    if req.orders.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "at least one order is required to start tracking".into(),
        ));
    }

    let orders = req.orders.clone();
    let data = begin(&state, &session, req.orders).await?;

    // After `begin`, so a replaced session cannot overwrite this snapshot.
    if let Err(e) = state.snapshots.save(&session.key, &orders).await {
        tracing::warn!("failed to persist order snapshot: {e}");
    }

    Ok(Json(ApiOk { data }))
}

/// Pick up tracking after a reload from the last persisted snapshot. The
/// session from before the reload is stopped.
pub async fn resume_tracking(
    State(state): State<AppState>,
    session: PatientSession,
) -> Result<Json<ApiOk<TrackingDto>>, ApiError> {
    let stored = match state.snapshots.load(&session.key).await {
        Ok(stored) => stored,
        Err(e) => {
            tracing::warn!("failed to load order snapshot: {e}");
            None
        }
    };

    let Some(stored) = stored.filter(|s| !s.orders.is_empty()) else {
        return Err(ApiError::NotFound(
            "NO_SAVED_ORDERS",
            "No saved orders to resume".into(),
        ));
    };

    tracing::debug!(saved_at = %stored.updated_at, "resuming order tracking");
    let data = begin(&state, &session, stored.orders).await?;
    Ok(Json(ApiOk { data }))
}

pub async fn get_tracking(
    State(state): State<AppState>,
    session: PatientSession,
    Path(tracking_id): Path<Uuid>,
) -> Result<Json<ApiOk<TrackingDto>>, ApiError> {
    let summary = state
        .tracking
        .summary(tracking_id, &session.key)
        .await
        .ok_or_else(ApiError::tracking_not_found)?;

    Ok(Json(ApiOk {
        data: summary.into(),
    }))
}

/// "Play audio guide": queue the room/queue announcement again.
pub async fn replay_announcement(
    State(state): State<AppState>,
    session: PatientSession,
    Path((tracking_id, order_id)): Path<(Uuid, i64)>,
) -> Result<Json<ApiOk<ReplayDto>>, ApiError> {
    let text = state
        .tracking
        .replay(tracking_id, &session.key, order_id)
        .await
        .ok_or_else(ApiError::tracking_not_found)??;

    Ok(Json(ApiOk {
        data: ReplayDto { order_id, text },
    }))
}

/// Announcements waiting to be spoken, oldest first. Draining removes them.
pub async fn drain_announcements(
    State(state): State<AppState>,
    session: PatientSession,
    Path(tracking_id): Path<Uuid>,
) -> Result<Json<ApiOk<Vec<Announcement>>>, ApiError> {
    let data = state
        .tracking
        .drain_announcements(tracking_id, &session.key)
        .await
        .ok_or_else(ApiError::tracking_not_found)?;

    Ok(Json(ApiOk { data }))
}

pub async fn stop_tracking(
    State(state): State<AppState>,
    session: PatientSession,
    Path(tracking_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    if !state.tracking.stop(tracking_id, &session.key).await {
        return Err(ApiError::tracking_not_found());
    }
    Ok(Json(ApiOk {
        data: OkData { ok: true },
    }))
}

/// Sign-out: stop every session of this patient and drop the saved snapshot.
pub async fn forget_tracking(
    State(state): State<AppState>,
    session: PatientSession,
) -> Result<Json<ApiOk<ForgetDto>>, ApiError> {
    let stopped_sessions = state.tracking.stop_owned_by(&session.key).await;

    if let Err(e) = state.snapshots.clear(&session.key).await {
        tracing::warn!("failed to clear order snapshot: {e}");
    }

    Ok(Json(ApiOk {
        data: ForgetDto { stopped_sessions },
    }))
}
