//! Order status tracking.
//!
//! A tracking session polls the order-status workflow for each of a patient's
//! orders, replaces its snapshot when any status moves, and queues spoken
//! announcements for the transitions the patient has to act on.
//!
//! ```ignore
//! let handle = start_tracking(orders, ctx, TrackerConfig::default())?;
//! let current = handle.orders();
//! handle.replay(order_id)?;
//! handle.stop().await;
//! ```

use std::time::Duration;

use async_trait::async_trait;

use crate::models::{Order, OrderStatus};
use crate::n8n::UpstreamError;

pub mod announce;
pub mod registry;
pub mod synchronizer;

pub use announce::{
    default_announcement, proceed_phrase, Announcement, AnnouncementQueue, Announcer,
    COMPLETED_PHRASE,
};
pub use registry::{spawn_reaper, TrackingRegistry, TrackingSummary};
pub use synchronizer::{
    run_cycle, start_tracking, CycleOutcome, SnapshotSink, TrackingContext, TrackingHandle,
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TrackingError {
    #[error("no orders to track")]
    NoOrders,
    #[error("order {0} is not tracked")]
    UnknownOrder(i64),
}

/// Where the current state of a single order comes from.
///
/// `Ok(None)` means the upstream had no usable update; the caller keeps what it had.
#[async_trait]
pub trait OrderStatusSource: Send + Sync {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, UpstreamError>;
}

/// Maps a transition (previous status, fresh order) to the text to speak, if any.
pub type AnnounceRule = fn(&OrderStatus, &Order) -> Option<String>;

#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    pub poll_interval: Duration,
    pub announce: AnnounceRule,
}

impl TrackerConfig {
    pub fn with_interval(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            ..Self::default()
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(3000),
            announce: default_announcement,
        }
    }
}
