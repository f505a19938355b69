//! Window summary: totals, per-status breakdown and the most failing interfaces.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use super::TOP_FAILURES_LIMIT;
use crate::query::{Filter, TimeWindow};
use crate::storage::{FailureCount, RecordStore, StatusStat, StoreError, Totals};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub start: String,
    pub end: String,
}

impl From<TimeWindow> for WindowBounds {
    fn from(w: TimeWindow) -> Self {
        Self {
            start: w.start.to_rfc3339_opts(SecondsFormat::Millis, true),
            end: w.end.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub range: WindowBounds,
    pub totals: Totals,
    pub by_status: Vec<StatusStat>,
    pub top_failures: Vec<FailureCount>,
}

/// Run the three summary aggregations concurrently. Any failure fails the
/// whole summary.
pub async fn compute(
    store: &dyn RecordStore,
    filter: &Filter,
    window: TimeWindow,
) -> Result<Summary, StoreError> {
    let (totals, by_status, top_failures) = tokio::try_join!(
        store.totals(filter),
        store.status_breakdown(filter),
        store.top_failures(filter, TOP_FAILURES_LIMIT),
    )?;

    Ok(Summary {
        range: window.into(),
        totals,
        by_status,
        top_failures,
    })
}
