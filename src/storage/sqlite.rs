//! SQLite-backed [`RecordStore`].
//!
//! rusqlite is blocking, so every query runs on the blocking thread pool with
//! a connection checked out of the r2d2 pool for the duration of the call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, Row};

use super::sql::WhereClause;
use super::{
    BucketStatusCount, FailureCount, FindQuery, Pool, RecordStore, StatusStat, StoreError, Totals,
};
use crate::model::{ExecutionRecord, ExecutionStatus, NewExecution};
use crate::query::{Bucket, Filter};

const RECORD_COLUMNS: &str = "id, interface_name, integration_key, status, start_time, end_time, \
     duration, message, error_details, severity, tags, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: Pool,
}

impl SqliteRecordStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn find(&self, query: FindQuery) -> Result<Vec<ExecutionRecord>, StoreError> {
        self.with_conn(move |conn| {
            let mut clause = WhereClause::from_filter(&query.filter);
            if let Some(cursor) = &query.seek {
                clause = clause.seek(cursor, query.direction);
            }
            let dir = query.direction.as_sql();
            let sql = format!(
                "SELECT {RECORD_COLUMNS} FROM executions
                 WHERE {}
                 ORDER BY start_time {dir}, id {dir}
                 LIMIT ?",
                clause.sql()
            );
            let mut params = clause.params;
            params.push(Value::Integer(query.limit as i64));

            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params_from_iter(params.iter()), record_from_row)?;
            let mut records = Vec::new();
            for r in rows {
                records.push(r?);
            }
            Ok(records)
        })
        .await
    }

    async fn status_breakdown(&self, filter: &Filter) -> Result<Vec<StatusStat>, StoreError> {
        let clause = WhereClause::from_filter(filter);
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT status, COUNT(*) AS n, AVG(duration)
                 FROM executions
                 WHERE {}
                 GROUP BY status
                 ORDER BY n DESC, status ASC",
                clause.sql()
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params_from_iter(clause.params.iter()), |row| {
                Ok(StatusStat {
                    status: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                    avg_duration: row.get(2)?,
                })
            })?;
            let mut stats = Vec::new();
            for r in rows {
                stats.push(r?);
            }
            Ok(stats)
        })
        .await
    }

    async fn totals(&self, filter: &Filter) -> Result<Totals, StoreError> {
        let clause = WhereClause::from_filter(filter);
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT COUNT(*), AVG(duration) FROM executions WHERE {}",
                clause.sql()
            );
            let totals = conn.query_row(&sql, params_from_iter(clause.params.iter()), |row| {
                Ok(Totals {
                    total: row.get::<_, i64>(0)? as u64,
                    avg_duration: row.get(1)?,
                })
            })?;
            Ok(totals)
        })
        .await
    }

    async fn top_failures(
        &self,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<FailureCount>, StoreError> {
        let clause = WhereClause::from_filter(filter).and(
            "status = ?",
            [Value::Text(ExecutionStatus::Failed.as_str().to_string())],
        );
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT interface_name, COUNT(*) AS fail_count
                 FROM executions
                 WHERE {}
                 GROUP BY interface_name
                 ORDER BY fail_count DESC, interface_name ASC
                 LIMIT ?",
                clause.sql()
            );
            let mut params = clause.params;
            params.push(Value::Integer(limit as i64));

            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
                Ok(FailureCount {
                    interface_name: row.get(0)?,
                    fail_count: row.get::<_, i64>(1)? as u64,
                })
            })?;
            let mut failures = Vec::new();
            for r in rows {
                failures.push(r?);
            }
            Ok(failures)
        })
        .await
    }

    async fn bucket_counts(
        &self,
        filter: &Filter,
        bucket: Bucket,
    ) -> Result<Vec<BucketStatusCount>, StoreError> {
        let clause = WhereClause::from_filter(filter);
        self.with_conn(move |conn| {
            // 'unixepoch' keeps truncation in UTC regardless of host locale.
            let sql = format!(
                "SELECT strftime('{}', start_time / 1000, 'unixepoch') AS bucket_key,
                        status, COUNT(*), SUM(duration), COUNT(duration)
                 FROM executions
                 WHERE {}
                 GROUP BY bucket_key, status
                 ORDER BY bucket_key ASC, status ASC",
                bucket.key_format(),
                clause.sql()
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params_from_iter(clause.params.iter()), |row| {
                Ok(BucketStatusCount {
                    bucket_key: row.get(0)?,
                    status: row.get(1)?,
                    count: row.get::<_, i64>(2)? as u64,
                    duration_sum: row.get::<_, Option<i64>>(3)?.unwrap_or(0) as f64,
                    duration_count: row.get::<_, i64>(4)? as u64,
                })
            })?;
            let mut counts = Vec::new();
            for r in rows {
                counts.push(r?);
            }
            Ok(counts)
        })
        .await
    }

    async fn insert_many(&self, records: Vec<NewExecution>) -> Result<usize, StoreError> {
        self.with_conn(move |conn| {
            let now = Utc::now().timestamp_millis();
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO executions
                        (interface_name, integration_key, status, start_time, end_time, duration,
                         message, error_details, severity, tags, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
                )?;
                for r in &records {
                    let error_details = r
                        .error_details
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()?;
                    stmt.execute(params![
                        r.interface_name,
                        r.integration_key,
                        r.status.as_str(),
                        r.start_time.timestamp_millis(),
                        r.end_time.map(|t| t.timestamp_millis()),
                        r.duration,
                        r.message,
                        error_details,
                        r.severity.as_str(),
                        serde_json::to_string(&r.tags)?,
                        now,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(records.len())
        })
        .await
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ExecutionRecord> {
    let error_details: Option<String> = row.get(8)?;
    let tags: String = row.get(10)?;

    Ok(ExecutionRecord {
        id: row.get(0)?,
        interface_name: row.get(1)?,
        integration_key: row.get(2)?,
        status: parse_text(row, 3)?,
        start_time: millis(row, 4)?,
        end_time: row
            .get::<_, Option<i64>>(5)?
            .map(|ms| to_datetime(5, ms))
            .transpose()?,
        duration: row.get(6)?,
        message: row.get(7)?,
        error_details: error_details
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?,
        severity: parse_text(row, 9)?,
        tags: serde_json::from_str(&tags)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?,
        created_at: millis(row, 11)?,
        updated_at: millis(row, 12)?,
    })
}

fn parse_text<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn millis(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    to_datetime(idx, row.get(idx)?)
}

fn to_datetime(idx: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}
