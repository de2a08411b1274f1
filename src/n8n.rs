// src/n8n.rs
//
// Client for the n8n webhooks that hold the check-in, ordering and payment workflows.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::models::Order;
use crate::tracking::OrderStatusSource;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("n8n webhook URL not configured")]
    NotConfigured,
    #[error("n8n request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("n8n returned {0}")]
    Status(StatusCode),
}

/// Status and parsed body of one webhook call.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub body: Value,
}

impl UpstreamReply {
    /// `success: true` in the body.
    pub fn succeeded(&self) -> bool {
        self.body.get("success").and_then(Value::as_bool).unwrap_or(false)
    }
}

#[derive(Clone)]
pub struct N8nClient {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl N8nClient {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    fn url(&self, hook: &str) -> Result<String, UpstreamError> {
        let base = self.base_url.as_deref().ok_or(UpstreamError::NotConfigured)?;
        Ok(format!("{base}/{}", hook.trim_start_matches('/')))
    }

    pub async fn get_json(
        &self,
        hook: &str,
        query: &[(&str, String)],
    ) -> Result<UpstreamReply, UpstreamError> {
        let url = self.url(hook)?;
        tracing::debug!(%url, "n8n GET");
        let resp = self.http.get(&url).query(query).send().await?;
        read_reply(resp).await
    }

    pub async fn post_json(&self, hook: &str, body: &Value) -> Result<UpstreamReply, UpstreamError> {
        let url = self.url(hook)?;
        tracing::debug!(%url, "n8n POST");
        let resp = self.http.post(&url).json(body).send().await?;
        read_reply(resp).await
    }

    pub async fn order_status(&self, order_id: i64) -> Result<UpstreamReply, UpstreamError> {
        self.get_json("order-status", &[("order_id", order_id.to_string())])
            .await
    }
}

/// Workflows sometimes answer with an empty or non-JSON body; both read as `{}`.
async fn read_reply(resp: reqwest::Response) -> Result<UpstreamReply, UpstreamError> {
    let status = resp.status();
    let text = resp.text().await?;
    Ok(UpstreamReply {
        status,
        body: parse_body(&text),
    })
}

pub fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::Object(Map::new()))
}

#[derive(Debug, Deserialize)]
struct OrderStatusBody {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    order: Option<Value>,
}

/// Reads an order-status reply. `None` means "no update available":
/// `success` not true, no `order`, or an order object missing fields.
pub fn order_from_status_body(body: &Value) -> Option<Order> {
    let parsed = OrderStatusBody::deserialize(body).ok()?;
    if !parsed.success {
        return None;
    }
    let raw = parsed.order?;
    match serde_json::from_value::<Order>(raw) {
        Ok(order) => Some(order),
        Err(e) => {
            tracing::debug!("partial order in status reply: {e}");
            None
        }
    }
}

#[async_trait]
impl OrderStatusSource for N8nClient {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, UpstreamError> {
        let reply = self.order_status(order_id).await?;
        if !reply.status.is_success() {
            return Err(UpstreamError::Status(reply.status));
        }
        Ok(order_from_status_body(&reply.body))
    }
}
