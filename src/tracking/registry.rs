// src/tracking/registry.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use uuid::Uuid;

use super::announce::{Announcement, AnnouncementQueue};
use super::synchronizer::{start_tracking, SnapshotSink, TrackingContext, TrackingHandle};
use super::{OrderStatusSource, TrackerConfig, TrackingError};
use crate::models::Order;
use crate::store::SnapshotStore;

struct TrackingSession {
    owner: String,
    handle: TrackingHandle,
    announcements: Arc<AnnouncementQueue>,
    started_at: DateTime<Utc>,
    /// Last time the owner read this session; drives idle expiry.
    last_seen: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackingSummary {
    pub tracking_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub orders: Vec<Order>,
    pub pending_announcements: usize,
}

/// Live tracking sessions, keyed by id and owned by a hashed session token.
///
/// An owner has at most one session: starting a new one (fresh start or resume
/// after a reload) stops the previous ones. Lookups with the wrong owner behave
/// as if the session did not exist.
#[derive(Default)]
pub struct TrackingRegistry {
    sessions: Mutex<HashMap<Uuid, TrackingSession>>,
}

impl TrackingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn start(
        &self,
        owner: &str,
        orders: Vec<Order>,
        source: Arc<dyn OrderStatusSource>,
        store: Arc<dyn SnapshotStore>,
        config: TrackerConfig,
    ) -> Result<TrackingSummary, TrackingError> {
        let announcements = Arc::new(AnnouncementQueue::new());
        let ctx = TrackingContext {
            source,
            announcer: announcements.clone(),
            persist: Some(SnapshotSink::new(store, owner)),
        };
        let handle = start_tracking(orders, ctx, config)?;

        let tracking_id = Uuid::new_v4();
        let session = TrackingSession {
            owner: owner.to_string(),
            handle,
            announcements,
            started_at: Utc::now(),
            last_seen: Instant::now(),
        };
        let summary = summarize(tracking_id, &session);

        let replaced = {
            let mut sessions = self.sessions.lock().await;
            let replaced = take_owned_by(&mut sessions, owner);
            sessions.insert(tracking_id, session);
            replaced
        };
        tracing::info!(
            %tracking_id,
            orders = summary.orders.len(),
            replaced = replaced.len(),
            "tracking session started"
        );
        for old in replaced {
            old.handle.stop().await;
        }

        Ok(summary)
    }

    pub async fn summary(&self, tracking_id: Uuid, owner: &str) -> Option<TrackingSummary> {
        let mut sessions = self.sessions.lock().await;
        let session = touch(&mut sessions, tracking_id, owner)?;
        Some(summarize(tracking_id, session))
    }

    /// `None` when the session is unknown; otherwise the replay result.
    pub async fn replay(
        &self,
        tracking_id: Uuid,
        owner: &str,
        order_id: i64,
    ) -> Option<Result<String, TrackingError>> {
        let mut sessions = self.sessions.lock().await;
        let session = touch(&mut sessions, tracking_id, owner)?;
        Some(session.handle.replay(order_id))
    }

    pub async fn drain_announcements(
        &self,
        tracking_id: Uuid,
        owner: &str,
    ) -> Option<Vec<Announcement>> {
        let mut sessions = self.sessions.lock().await;
        let session = touch(&mut sessions, tracking_id, owner)?;
        Some(session.announcements.drain())
    }

    /// Stop one session. Returns false when it is unknown.
    pub async fn stop(&self, tracking_id: Uuid, owner: &str) -> bool {
        let session = {
            let mut sessions = self.sessions.lock().await;
            let owned = sessions
                .get(&tracking_id)
                .is_some_and(|s| s.owner == owner);
            if owned { sessions.remove(&tracking_id) } else { None }
        };

        match session {
            Some(session) => {
                session.handle.stop().await;
                tracing::info!(%tracking_id, "tracking session stopped");
                true
            }
            None => false,
        }
    }

    /// Stop every session of one owner (sign-out). Returns how many were stopped.
    pub async fn stop_owned_by(&self, owner: &str) -> usize {
        let stopped = take_owned_by(&mut *self.sessions.lock().await, owner);

        let count = stopped.len();
        for session in stopped {
            session.handle.stop().await;
        }
        count
    }

    /// Stop sessions nobody has read for `max_idle`. Returns how many were stopped.
    pub async fn reap_idle(&self, max_idle: Duration) -> usize {
        let idle: Vec<(Uuid, TrackingSession)> = {
            let mut sessions = self.sessions.lock().await;
            let ids: Vec<Uuid> = sessions
                .iter()
                .filter(|(_, s)| s.last_seen.elapsed() >= max_idle)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| sessions.remove(&id).map(|s| (id, s)))
                .collect()
        };

        let count = idle.len();
        for (tracking_id, session) in idle {
            tracing::info!(%tracking_id, "tracking session idle, stopping");
            session.handle.stop().await;
        }
        count
    }

    pub async fn shutdown(&self) {
        let all: Vec<TrackingSession> = {
            let mut sessions = self.sessions.lock().await;
            sessions.drain().map(|(_, s)| s).collect()
        };
        if !all.is_empty() {
            tracing::info!(sessions = all.len(), "stopping tracking sessions");
        }
        for session in all {
            session.handle.stop().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Periodically stop sessions idle for `max_idle`. Abort the handle to end it.
pub fn spawn_reaper(registry: Arc<TrackingRegistry>, max_idle: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = (max_idle / 4).max(Duration::from_millis(1));
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            registry.reap_idle(max_idle).await;
        }
    })
}

fn take_owned_by(
    sessions: &mut HashMap<Uuid, TrackingSession>,
    owner: &str,
) -> Vec<TrackingSession> {
    let ids: Vec<Uuid> = sessions
        .iter()
        .filter(|(_, s)| s.owner == owner)
        .map(|(id, _)| *id)
        .collect();
    ids.iter().filter_map(|id| sessions.remove(id)).collect()
}

/// Owner-checked lookup that also marks the session as read.
fn touch<'a>(
    sessions: &'a mut HashMap<Uuid, TrackingSession>,
    tracking_id: Uuid,
    owner: &str,
) -> Option<&'a mut TrackingSession> {
    let session = sessions.get_mut(&tracking_id).filter(|s| s.owner == owner)?;
    session.last_seen = Instant::now();
    Some(session)
}

fn summarize(tracking_id: Uuid, session: &TrackingSession) -> TrackingSummary {
    TrackingSummary {
        tracking_id,
        started_at: session.started_at,
        orders: session.handle.orders(),
        pending_announcements: session.announcements.len(),
    }
}
