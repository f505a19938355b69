//! execwatch -- Interface execution monitoring backend.
//!
//! Stores integration run records in SQLite and serves the dashboard API:
//! seek-paginated listings, cached window summaries, bucketed chart data
//! and a background-refreshed 24h rollup.

pub mod analytics;
pub mod api;
pub mod cache;
pub mod config;
pub mod cursor;
pub mod model;
pub mod pagination;
pub mod query;
pub mod seed;
pub mod storage;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::analytics::Analytics;
use crate::cache::{KvCache, MemoryCache};
use crate::config::Config;
use crate::storage::{RecordStore, SqliteRecordStore};

/// Open the configured database and return a shared store.
pub fn open_store(db_path: &str) -> Result<Arc<SqliteRecordStore>> {
    tracing::info!(%db_path, "Initializing database");
    let pool = storage::open_pool(db_path)?;
    Ok(Arc::new(SqliteRecordStore::new(pool)))
}

/// Start the execwatch daemon: API server and rollup refresher.
pub async fn serve(config: Config) -> Result<()> {
    // 1. Storage and cache
    let store: Arc<dyn RecordStore> = open_store(&config.server.db_path)?;
    let cache: Arc<dyn KvCache> = Arc::new(MemoryCache::new());
    let analytics = Analytics::new(store.clone(), cache).with_ttls(
        Duration::from_secs(config.cache.summary_ttl_secs),
        Duration::from_secs(config.cache.rollup_ttl_secs),
    );

    // 2. Rollup refresher (background task)
    if config.cache.rollup_interval_secs > 0 {
        let refresher = analytics.clone();
        let interval = Duration::from_secs(config.cache.rollup_interval_secs);
        tokio::spawn(async move {
            analytics::rollup::run_rollup_loop(refresher, interval).await;
        });
    }

    // 3. API server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.server.bind))?;
    let state = api::state::AppState::new(store, analytics, &config);
    let app = api::app(state, &config);

    tracing::info!(%addr, "execwatch listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("execwatch stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
