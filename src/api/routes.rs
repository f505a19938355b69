//! API route definitions.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use super::state::AppState;
use crate::analytics::Chart;
use crate::model::ExecutionItem;
use crate::pagination::{self, Page};
use crate::query::{ChartParams, ListParams, SummaryParams};
use crate::seed;

type Pairs = Query<Vec<(String, String)>>;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/executions", get(list_executions))
        .route("/executions/summary", get(summary))
        .route("/executions/chart-data", get(chart_data))
        .route("/executions/rollup", get(rollup))
        .route("/executions/generate-test-data", post(generate_test_data))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "ok": true,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_executions(
    State(state): State<AppState>,
    Query(pairs): Pairs,
) -> Result<Json<Page<ExecutionItem>>, ApiError> {
    let params = ListParams::from_pairs(&pairs)?;
    let page = pagination::list_executions(state.store.as_ref(), params).await?;
    Ok(Json(page))
}

/// The cached payload is already serialized; it is sent as-is.
async fn summary(State(state): State<AppState>, Query(pairs): Pairs) -> Result<Response, ApiError> {
    let params = SummaryParams::from_pairs(&pairs)?;
    let payload = state.analytics.summary(&params, Utc::now()).await?;
    Ok(raw_json(payload))
}

async fn chart_data(
    State(state): State<AppState>,
    Query(pairs): Pairs,
) -> Result<Json<Chart>, ApiError> {
    let params = ChartParams::from_pairs(&pairs)?;
    Ok(Json(state.analytics.chart(&params, Utc::now()).await?))
}

async fn rollup(State(state): State<AppState>) -> Result<Response, ApiError> {
    let payload = state.analytics.rollup(Utc::now()).await?;
    Ok(raw_json(payload))
}

#[derive(Debug, Deserialize)]
struct SeedRequest {
    #[serde(default = "default_seed_count")]
    count: usize,
}

fn default_seed_count() -> usize {
    1000
}

/// An empty body seeds the default count.
async fn generate_test_data(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    if !state.seed.allow_endpoint {
        return Err(ApiError::Forbidden("test data generation is disabled"));
    }

    let request: SeedRequest = if body.is_empty() {
        SeedRequest {
            count: default_seed_count(),
        }
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?
    };

    let count = request.count.min(state.seed.max_count);
    let seeded = seed::run(state.store.as_ref(), count, seed::DEFAULT_BATCH_SIZE).await;
    Ok(Json(json!({ "seeded": seeded })))
}

fn raw_json(payload: String) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], payload).into_response()
}
