//! Seek-based pagination over the execution listing.
//!
//! Pages are windows over the total order `(start_time, id)`. A page fetches
//! one row more than it returns; the extra row only signals that another
//! page exists, and the cursor is cut from the last row actually returned.

use serde::Serialize;
use thiserror::Error;

use crate::cursor::{CursorError, PageCursor};
use crate::model::ExecutionItem;
use crate::query::params::MAX_LIMIT;
use crate::query::ListParams;
use crate::storage::{FindQuery, RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Cursor(#[from] CursorError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Absent at the end of the results.
    pub next_cursor: Option<String>,
}

pub async fn list_executions(
    store: &dyn RecordStore,
    params: ListParams,
) -> Result<Page<ExecutionItem>, PageError> {
    let seek = params
        .cursor
        .as_deref()
        .map(PageCursor::decode)
        .transpose()?;
    let limit = params.limit.clamp(1, MAX_LIMIT);

    let mut rows = store
        .find(FindQuery {
            filter: params.filter,
            seek,
            direction: params.sort,
            limit: limit + 1,
        })
        .await?;

    let next_cursor = if rows.len() > limit {
        rows.truncate(limit);
        rows.last().map(|last| PageCursor::after(last).encode())
    } else {
        None
    };

    tracing::debug!(
        returned = rows.len(),
        limit,
        has_more = next_cursor.is_some(),
        "listed executions"
    );

    Ok(Page {
        items: rows.into_iter().map(ExecutionItem::from).collect(),
        next_cursor,
    })
}
