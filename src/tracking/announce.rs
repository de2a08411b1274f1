// src/tracking/announce.rs

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Order, OrderStatus};

pub const COMPLETED_PHRASE: &str = "Your test has been completed. Thank you!";

/// Oldest entries are dropped past this many undrained announcements.
const QUEUE_CAPACITY: usize = 64;

pub fn proceed_phrase(order: &Order) -> String {
    format!(
        "Please proceed to {}. Queue number {}.",
        order.room_number, order.queue_number
    )
}

/// Speak when an order starts (`in_progress`) or finishes (`completed`).
pub fn default_announcement(previous: &OrderStatus, fresh: &Order) -> Option<String> {
    if *previous == fresh.status {
        return None;
    }
    match fresh.status {
        OrderStatus::InProgress => Some(proceed_phrase(fresh)),
        OrderStatus::Completed => Some(COMPLETED_PHRASE.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Announcement {
    pub order_id: i64,
    pub text: String,
    pub queued_at: DateTime<Utc>,
}

impl Announcement {
    pub fn new(order_id: i64, text: impl Into<String>) -> Self {
        Self {
            order_id,
            text: text.into(),
            queued_at: Utc::now(),
        }
    }
}

/// Sink for speech. Fire-and-forget: implementations never block the caller.
pub trait Announcer: Send + Sync {
    fn announce(&self, announcement: Announcement);
}

/// FIFO of announcements waiting for the client to speak them.
///
/// The client drains the queue and speaks entries one after another, so a new
/// announcement never cuts off one that is playing.
#[derive(Debug, Default)]
pub struct AnnouncementQueue {
    pending: Mutex<VecDeque<Announcement>>,
}

impl AnnouncementQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Announcement> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Announcer for AnnouncementQueue {
    fn announce(&self, announcement: Announcement) {
        tracing::info!(order_id = announcement.order_id, text = %announcement.text, "announcement queued");
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if pending.len() >= QUEUE_CAPACITY {
            if let Some(dropped) = pending.pop_front() {
                tracing::warn!(order_id = dropped.order_id, "announcement queue full, dropping oldest");
            }
        }
        pending.push_back(announcement);
    }
}
