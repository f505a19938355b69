//! Time-bucketed status histogram.

use serde::{Deserialize, Serialize};

use crate::storage::BucketStatusCount;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRow {
    pub bucket_key: String,
    pub statuses: Vec<StatusCount>,
    /// Mean over every record in the bucket that has a duration.
    pub avg_duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub rows: Vec<ChartRow>,
}

/// Second aggregation stage: collapse `(bucket, status)` rows, which arrive
/// sorted by bucket key, into one row per bucket.
pub fn fold(counts: Vec<BucketStatusCount>) -> Vec<ChartRow> {
    let mut rows: Vec<ChartRow> = Vec::new();
    let mut sum = 0.0;
    let mut n = 0u64;

    for c in counts {
        let same_bucket = rows
            .last()
            .map(|r| r.bucket_key == c.bucket_key)
            .unwrap_or(false);
        if !same_bucket {
            if let Some(prev) = rows.last_mut() {
                prev.avg_duration = mean(sum, n);
            }
            sum = 0.0;
            n = 0;
            rows.push(ChartRow {
                bucket_key: c.bucket_key.clone(),
                statuses: Vec::new(),
                avg_duration: None,
            });
        }
        sum += c.duration_sum;
        n += c.duration_count;
        if let Some(row) = rows.last_mut() {
            row.statuses.push(StatusCount {
                status: c.status,
                count: c.count,
            });
        }
    }
    if let Some(last) = rows.last_mut() {
        last.avg_duration = mean(sum, n);
    }

    rows
}

fn mean(sum: f64, n: u64) -> Option<f64> {
    (n > 0).then(|| sum / n as f64)
}
