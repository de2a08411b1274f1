use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::n8n::N8nClient;
use crate::store::SnapshotStore;
use crate::tracking::{TrackerConfig, TrackingRegistry};

#[derive(Clone)]
pub struct AppState {
    pub n8n: N8nClient,
    pub tracking: Arc<TrackingRegistry>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub tracker_config: TrackerConfig,
}

/* -------------------------
   Domain
--------------------------*/

/// Order lifecycle as reported by the order-status workflow.
///
/// Unknown values are kept verbatim so they can still be displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Pending,
    Paid,
    Assigned,
    InProgress,
    Completed,
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Assigned => "assigned",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Other(raw) => raw,
        }
    }

    /// Label shown to patients and staff.
    pub fn label(&self) -> &str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Paid => "Paid",
            OrderStatus::Assigned => "Assigned",
            OrderStatus::InProgress => "In progress",
            OrderStatus::Completed => "Done",
            OrderStatus::Other(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, OrderStatus::Other(_))
    }
}

impl From<String> for OrderStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "pending" => OrderStatus::Pending,
            "paid" => OrderStatus::Paid,
            "assigned" => OrderStatus::Assigned,
            "in_progress" => OrderStatus::InProgress,
            "completed" => OrderStatus::Completed,
            _ => OrderStatus::Other(raw),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One order as last seen by the patient.
///
/// Every field except `procedure_name` is required: an upstream object
/// missing one of them does not deserialize, and the caller keeps the
/// previous snapshot instead of merging fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(deserialize_with = "lenient_i64")]
    pub id: i64,
    #[serde(deserialize_with = "lenient_string")]
    pub order_number: String,
    #[serde(deserialize_with = "lenient_string")]
    pub queue_number: String,
    #[serde(deserialize_with = "lenient_string")]
    pub room_number: String,
    pub status: OrderStatus,
    #[serde(deserialize_with = "lenient_f64")]
    pub total_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedure_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    /// Minutes.
    pub duration: i64,
    pub room: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckedInUser {
    pub id: i64,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

/// Order plus display fields, as returned by the tracking endpoints.
#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub status_label: String,
    pub total_display: String,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        let status_label = order.status.label().to_string();
        let total_display = format_vnd(order.total_amount);
        OrderView {
            order,
            status_label,
            total_display,
        }
    }
}

/* -------------------------
   Helpers
--------------------------*/

/// Whole dong with `.` as thousands separator, e.g. `1.234.567 ₫`.
pub fn format_vnd(amount: f64) -> String {
    let rounded = amount.round();
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if negative {
        format!("-{grouped} ₫")
    } else {
        format!("{grouped} ₫")
    }
}

// n8n hands Postgres numerics and ids through as either JSON numbers or strings.

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Int(i64),
    Float(f64),
    Text(String),
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Int(n) => Ok(n),
        NumberOrString::Float(f) => integral_i64(f)
            .ok_or_else(|| serde::de::Error::custom(format!("not an integer id: {f}"))),
        NumberOrString::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid id {s:?}: {e}"))),
    }
}

/// `f` as an i64 when it is a whole number in range; `None` instead of truncating.
pub(crate) fn integral_i64(f: f64) -> Option<i64> {
    // 2^63 is exact in f64; anything at or past it saturates.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f)).then_some(f as i64)
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Int(n) => Ok(n as f64),
        NumberOrString::Float(f) => Ok(f),
        NumberOrString::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid amount {s:?}: {e}"))),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Int(n) => Ok(n.to_string()),
        NumberOrString::Float(f) => Ok(f.to_string()),
        NumberOrString::Text(s) => Ok(s),
    }
}
