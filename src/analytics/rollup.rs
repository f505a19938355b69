//! Precomputed 24h status rollup, refreshed in the background.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::Analytics;
use crate::query::{Filter, RangePreset, TimeWindow};
use crate::storage::{RecordStore, StatusStat, StoreError};

pub const ROLLUP_KEY: &str = "rollup:24h";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rollup {
    pub start: String,
    pub end: String,
    pub by_status: Vec<StatusStat>,
}

pub async fn compute(store: &dyn RecordStore, now: DateTime<Utc>) -> Result<Rollup, StoreError> {
    let window = TimeWindow {
        start: now - RangePreset::LastDay.span(),
        end: now,
    };
    let by_status = store
        .status_breakdown(&Filter::default().within(window))
        .await?;
    Ok(Rollup {
        start: window.start.to_rfc3339_opts(SecondsFormat::Millis, true),
        end: window.end.to_rfc3339_opts(SecondsFormat::Millis, true),
        by_status,
    })
}

/// Refresh the rollup every `interval` until the task is dropped.
pub async fn run_rollup_loop(analytics: Analytics, interval: Duration) {
    tracing::info!(interval_secs = interval.as_secs(), "Rollup refresher started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match analytics.recompute_rollup(Utc::now()).await {
            Ok(_) => tracing::debug!("24h rollup refreshed"),
            Err(e) => tracing::warn!(error = %e, "failed to refresh 24h rollup"),
        }
    }
}
