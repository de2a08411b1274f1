use std::sync::Arc;

use checkin_gateway::{
    config::Config,
    db,
    models::AppState,
    n8n::N8nClient,
    routes,
    store::{MemorySnapshotStore, PgSnapshotStore, SnapshotStore},
    tracking::{spawn_reaper, TrackerConfig, TrackingRegistry},
};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;

    if cfg.n8n_base_url.is_none() {
        tracing::warn!("N8N_WEBHOOK_URL is not set; proxied routes will answer 500");
    }
    let n8n = N8nClient::new(cfg.n8n_base_url.clone(), cfg.upstream_timeout)?;

    let snapshots: Arc<dyn SnapshotStore> = match cfg.database_url.as_deref() {
        Some(url) => Arc::new(PgSnapshotStore::new(db::connect_pg(url).await?)),
        None => {
            tracing::warn!("DATABASE_URL is not set; order snapshots are kept in memory");
            Arc::new(MemorySnapshotStore::new())
        }
    };

    let tracking = Arc::new(TrackingRegistry::new());
    let reaper = spawn_reaper(tracking.clone(), cfg.session_idle_timeout);
    let state = AppState {
        n8n,
        tracking: tracking.clone(),
        snapshots,
        tracker_config: TrackerConfig::with_interval(cfg.poll_interval),
    };

    // Patient app and worker dashboard are served from other origins.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reaper.abort();
    tracking.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
