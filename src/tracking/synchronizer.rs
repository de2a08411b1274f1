// src/tracking/synchronizer.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant, MissedTickBehavior};

use super::announce::{proceed_phrase, Announcement, Announcer};
use super::{AnnounceRule, OrderStatusSource, TrackerConfig, TrackingError};
use crate::models::Order;
use crate::store::SnapshotStore;

/// Result of one poll over every tracked order.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    /// Same length and order as the input: fresh data where an update arrived,
    /// the previous snapshot everywhere else.
    pub orders: Vec<Order>,
    /// At least one status differs from the previous snapshot.
    pub changed: bool,
    pub announcements: Vec<Announcement>,
}

/// Fetch every order concurrently and merge the replies into the previous snapshots.
///
/// Per-order failures (transport, non-2xx, unusable body, even a panicking fetch)
/// leave that order's snapshot as it was.
pub async fn run_cycle(
    source: Arc<dyn OrderStatusSource>,
    current: Vec<Order>,
    announce: AnnounceRule,
) -> CycleOutcome {
    let mut fetches = JoinSet::new();
    for (idx, order) in current.iter().enumerate() {
        let source = Arc::clone(&source);
        let order_id = order.id;
        fetches.spawn(async move { (idx, source.fetch_order(order_id).await) });
    }

    let mut fresh: Vec<Option<Order>> = vec![None; current.len()];
    while let Some(joined) = fetches.join_next().await {
        match joined {
            Ok((idx, Ok(Some(order)))) => {
                if order.id == current[idx].id {
                    fresh[idx] = Some(order);
                } else {
                    tracing::warn!(
                        requested = current[idx].id,
                        returned = order.id,
                        "order-status returned a different order, ignoring"
                    );
                }
            }
            Ok((idx, Ok(None))) => {
                tracing::debug!(order_id = current[idx].id, "no status update available");
            }
            Ok((idx, Err(e))) => {
                tracing::warn!(order_id = current[idx].id, "order status fetch failed: {e}");
            }
            Err(e) => {
                tracing::warn!("order status fetch task failed: {e}");
            }
        }
    }

    let mut changed = false;
    let mut announcements = Vec::new();
    let orders = current
        .into_iter()
        .zip(fresh)
        .map(|(previous, update)| match update {
            Some(order) => {
                if order.status != previous.status {
                    changed = true;
                    tracing::info!(
                        order_id = order.id,
                        from = %previous.status,
                        to = %order.status,
                        "order status changed"
                    );
                    if let Some(text) = announce(&previous.status, &order) {
                        announcements.push(Announcement::new(order.id, text));
                    }
                }
                order
            }
            None => previous,
        })
        .collect();

    CycleOutcome {
        orders,
        changed,
        announcements,
    }
}

/// Writes the tracked orders to the snapshot store under the session key.
#[derive(Clone)]
pub struct SnapshotSink {
    store: Arc<dyn SnapshotStore>,
    key: String,
}

impl SnapshotSink {
    pub fn new(store: Arc<dyn SnapshotStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Best-effort; failures are logged only.
    pub async fn save(&self, orders: &[Order]) {
        if let Err(e) = self.store.save(&self.key, orders).await {
            tracing::warn!("failed to persist order snapshot: {e}");
        }
    }
}

/// Collaborators of one tracking session.
#[derive(Clone)]
pub struct TrackingContext {
    pub source: Arc<dyn OrderStatusSource>,
    pub announcer: Arc<dyn Announcer>,
    pub persist: Option<SnapshotSink>,
}

struct Tracker {
    ctx: TrackingContext,
    config: TrackerConfig,
    orders: watch::Sender<Vec<Order>>,
    active: Arc<AtomicBool>,
}

impl Tracker {
    async fn run(self) {
        let period = self.config.poll_interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        // A slow cycle delays the next one instead of stacking more fetches behind it.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if !self.active.load(Ordering::Acquire) {
                break;
            }

            let current = self.orders.borrow().clone();
            // Held in a JoinSet so aborting this loop also aborts the cycle in flight.
            let mut cycle = JoinSet::new();
            cycle.spawn(run_cycle(
                Arc::clone(&self.ctx.source),
                current,
                self.config.announce,
            ));

            match cycle.join_next().await {
                Some(Ok(outcome)) => self.apply(outcome).await,
                Some(Err(e)) => tracing::error!("order status cycle failed: {e}"),
                None => {}
            }
        }
    }

    async fn apply(&self, outcome: CycleOutcome) {
        if !self.active.load(Ordering::Acquire) {
            tracing::debug!("tracking stopped, discarding cycle result");
            return;
        }
        if !outcome.changed {
            return;
        }

        for announcement in outcome.announcements {
            self.ctx.announcer.announce(announcement);
        }

        if let Some(sink) = &self.ctx.persist {
            sink.save(&outcome.orders).await;
        }
        self.orders.send_replace(outcome.orders);
    }
}

/// Start polling `initial` every `config.poll_interval`.
///
/// The returned handle owns the poll task; stopping or dropping it ends polling.
pub fn start_tracking(
    initial: Vec<Order>,
    ctx: TrackingContext,
    config: TrackerConfig,
) -> Result<TrackingHandle, TrackingError> {
    if initial.is_empty() {
        return Err(TrackingError::NoOrders);
    }

    let (tx, rx) = watch::channel(initial);
    let active = Arc::new(AtomicBool::new(true));
    let announcer = Arc::clone(&ctx.announcer);

    let tracker = Tracker {
        ctx,
        config,
        orders: tx,
        active: Arc::clone(&active),
    };
    let task = tokio::spawn(tracker.run());

    tracing::debug!(interval_ms = config.poll_interval.as_millis() as u64, "order tracking started");

    Ok(TrackingHandle {
        orders: rx,
        announcer,
        active,
        task,
    })
}

pub struct TrackingHandle {
    orders: watch::Receiver<Vec<Order>>,
    announcer: Arc<dyn Announcer>,
    active: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl TrackingHandle {
    pub fn orders(&self) -> Vec<Order> {
        self.orders.borrow().clone()
    }

    /// Receiver that is notified each time the snapshot sequence is replaced.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Order>> {
        self.orders.clone()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) && !self.task.is_finished()
    }

    /// Announce the room and queue of `order_id` again ("play audio guide").
    pub fn replay(&self, order_id: i64) -> Result<String, TrackingError> {
        let text = {
            let orders = self.orders.borrow();
            let order = orders
                .iter()
                .find(|o| o.id == order_id)
                .ok_or(TrackingError::UnknownOrder(order_id))?;
            proceed_phrase(order)
        };
        self.announcer
            .announce(Announcement::new(order_id, text.clone()));
        Ok(text)
    }

    pub async fn stop(mut self) {
        self.active.store(false, Ordering::Release);
        self.task.abort();
        let _ = (&mut self.task).await;
        tracing::debug!("order tracking stopped");
    }
}

impl Drop for TrackingHandle {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
        self.task.abort();
    }
}
