use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    /// Base URL of the n8n webhooks, e.g. `https://example.app.n8n.cloud/webhook`.
    pub n8n_base_url: Option<String>,
    /// Absent means snapshots are kept in memory only.
    pub database_url: Option<String>,
    pub poll_interval: Duration,
    pub upstream_timeout: Duration,
    /// Tracking sessions nobody reads for this long are stopped.
    pub session_idle_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        // The Next.js frontend used the NEXT_PUBLIC_ prefix; accept both.
        let n8n_base_url = non_empty_var("N8N_WEBHOOK_URL")
            .or_else(|| non_empty_var("NEXT_PUBLIC_N8N_WEBHOOK_URL"))
            .map(|url| url.trim_end_matches('/').to_string());

        let database_url = non_empty_var("DATABASE_URL");

        let poll_interval_ms = millis_var("POLL_INTERVAL_MS", 3000)?;
        if poll_interval_ms == 0 {
            anyhow::bail!("POLL_INTERVAL_MS must be greater than zero");
        }
        let upstream_timeout_ms = millis_var("UPSTREAM_TIMEOUT_MS", 10_000)?;
        let idle_timeout_ms = millis_var("SESSION_IDLE_TIMEOUT_MS", 300_000)?;
        if idle_timeout_ms == 0 {
            anyhow::bail!("SESSION_IDLE_TIMEOUT_MS must be greater than zero");
        }

        Ok(Self {
            bind_addr,
            n8n_base_url,
            database_url,
            poll_interval: Duration::from_millis(poll_interval_ms),
            upstream_timeout: Duration::from_millis(upstream_timeout_ms),
            session_idle_timeout: Duration::from_millis(idle_timeout_ms),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn millis_var(key: &str, default: u64) -> anyhow::Result<u64> {
    match non_empty_var(key) {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|e| anyhow::anyhow!("{key} must be a number of milliseconds: {e}")),
        None => Ok(default),
    }
}
