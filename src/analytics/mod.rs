//! Dashboard aggregates: window summary, bucketed chart data and the 24h rollup.
//!
//! Only the summary and the rollup go through the cache. Chart and listing
//! requests always hit the store.

pub mod chart;
pub mod rollup;
pub mod summary;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::cache::{CacheError, KvCache};
use crate::query::{ChartParams, SummaryParams};
use crate::storage::{RecordStore, StoreError};

pub use self::chart::{Chart, ChartRow, StatusCount};
pub use self::rollup::Rollup;
pub use self::summary::Summary;

pub const DEFAULT_SUMMARY_TTL: Duration = Duration::from_secs(30);
pub const DEFAULT_ROLLUP_TTL: Duration = Duration::from_secs(60);
pub const TOP_FAILURES_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Aggregation engine. Store and cache are injected.
#[derive(Clone)]
pub struct Analytics {
    store: Arc<dyn RecordStore>,
    cache: Arc<dyn KvCache>,
    summary_ttl: Duration,
    rollup_ttl: Duration,
}

impl Analytics {
    pub fn new(store: Arc<dyn RecordStore>, cache: Arc<dyn KvCache>) -> Self {
        Self {
            store,
            cache,
            summary_ttl: DEFAULT_SUMMARY_TTL,
            rollup_ttl: DEFAULT_ROLLUP_TTL,
        }
    }

    pub fn with_ttls(mut self, summary_ttl: Duration, rollup_ttl: Duration) -> Self {
        self.summary_ttl = summary_ttl;
        self.rollup_ttl = rollup_ttl;
        self
    }

    /// Summary JSON for the requested window, served from cache when fresh.
    ///
    /// The returned string is exactly what was cached, so repeated requests
    /// within the TTL are byte-identical.
    pub async fn summary(
        &self,
        params: &SummaryParams,
        now: DateTime<Utc>,
    ) -> Result<String, AnalyticsError> {
        let window = params.window(now);
        let filter = params.filter.clone().within(window);
        let key = format!("summary:{}", filter.signature());

        if let Some(hit) = self.cache.get(&key).await? {
            tracing::debug!(%key, "summary cache hit");
            return Ok(hit);
        }

        let summary = summary::compute(self.store.as_ref(), &filter, window).await?;
        let payload = serde_json::to_string(&summary)?;
        self.cache
            .set(&key, payload.clone(), self.summary_ttl)
            .await?;
        tracing::debug!(%key, total = summary.totals.total, "summary computed");
        Ok(payload)
    }

    pub async fn chart(
        &self,
        params: &ChartParams,
        now: DateTime<Utc>,
    ) -> Result<Chart, AnalyticsError> {
        let filter = params.filter.clone().within(params.window(now));
        let counts = self.store.bucket_counts(&filter, params.bucket).await?;
        Ok(Chart {
            rows: chart::fold(counts),
        })
    }

    /// Cached 24h rollup JSON, recomputed on a miss.
    pub async fn rollup(&self, now: DateTime<Utc>) -> Result<String, AnalyticsError> {
        if let Some(hit) = self.cache.get(rollup::ROLLUP_KEY).await? {
            return Ok(hit);
        }
        self.recompute_rollup(now).await
    }

    /// Recompute the 24h rollup and refresh its cache entry.
    pub async fn recompute_rollup(&self, now: DateTime<Utc>) -> Result<String, AnalyticsError> {
        let rollup = rollup::compute(self.store.as_ref(), now).await?;
        let payload = serde_json::to_string(&rollup)?;
        self.cache
            .set(rollup::ROLLUP_KEY, payload.clone(), self.rollup_ttl)
            .await?;
        Ok(payload)
    }
}
