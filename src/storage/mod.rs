//! Record store -- the execution collection, its schema and its queries.

pub mod schema;
pub mod sql;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cursor::PageCursor;
use crate::model::{ExecutionRecord, NewExecution};
use crate::query::{Bucket, Filter, SortDirection};

pub use self::sqlite::SqliteRecordStore;

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A bounded, ordered scan over the collection.
#[derive(Debug, Clone)]
pub struct FindQuery {
    pub filter: Filter,
    /// Strict seek position; rows at or before it (in `direction`) are skipped.
    pub seek: Option<PageCursor>,
    pub direction: SortDirection,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusStat {
    pub status: String,
    pub count: u64,
    pub avg_duration: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub total: u64,
    pub avg_duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureCount {
    pub interface_name: String,
    pub fail_count: u64,
}

/// First aggregation stage of the chart: one row per (bucket, status).
#[derive(Debug, Clone, PartialEq)]
pub struct BucketStatusCount {
    pub bucket_key: String,
    pub status: String,
    pub count: u64,
    /// Sum and count of non-null durations, so the caller can average
    /// across the whole bucket.
    pub duration_sum: f64,
    pub duration_count: u64,
}

/// Read-mostly access to execution records.
///
/// Implementations must be shareable across request tasks; the API layer
/// holds one behind an `Arc<dyn RecordStore>`.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Rows matching the filter and seek, ordered by `(start_time, id)`.
    async fn find(&self, query: FindQuery) -> Result<Vec<ExecutionRecord>, StoreError>;

    /// Count and average duration per status, most frequent first.
    async fn status_breakdown(&self, filter: &Filter) -> Result<Vec<StatusStat>, StoreError>;

    async fn totals(&self, filter: &Filter) -> Result<Totals, StoreError>;

    /// Interfaces ranked by FAILED count, descending, at most `limit`.
    async fn top_failures(
        &self,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<FailureCount>, StoreError>;

    /// Per-(bucket, status) counts ordered by bucket key then status.
    async fn bucket_counts(
        &self,
        filter: &Filter,
        bucket: Bucket,
    ) -> Result<Vec<BucketStatusCount>, StoreError>;

    /// Bulk insert; returns the number of rows written.
    async fn insert_many(&self, records: Vec<NewExecution>) -> Result<usize, StoreError>;
}

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &str) -> Result<Pool> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}
