//! Flight data read endpoints.
//!
//! # Endpoints
//!
//! ### `GET /api/current-data`
//! Latest sample. `404` until the first tick has run.
//!
//! ### `GET /api/historical-data?limit=N`
//! Up to `N` (default 100) most recent samples, oldest first.
//!
//! ### `GET /api/arinc429-data`
//! Latest sample with its six ARINC 429 words, also keyed by label.
//! Reading it does not advance the simulation.
//!
//! ### `GET /api/statistics`
//! Broadcaster counters.

use arinc_protocol::SampleRecord;
use arinc_server::BroadcastStatistics;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::AppState;

/// Default number of samples returned by the history endpoint.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/current-data", get(current_data))
        .route("/historical-data", get(historical_data))
        .route("/arinc429-data", get(arinc429_data))
        .route("/statistics", get(statistics))
}

#[derive(Debug, Serialize)]
pub struct CurrentDataResponse {
    pub status: &'static str,
    pub data: SampleRecord,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub status: &'static str,
    pub count: usize,
    pub data: Vec<SampleRecord>,
}

#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub status: &'static str,
    pub statistics: BroadcastStatistics,
}

/// GET /api/current-data
async fn current_data(State(state): State<AppState>) -> Result<Json<CurrentDataResponse>, ApiError> {
    let sample = state
        .broadcaster
        .latest()
        .await
        .ok_or_else(|| ApiError::NotFound("No flight data available yet".to_string()))?;

    Ok(Json(CurrentDataResponse {
        status: "success",
        data: SampleRecord::from(&sample),
    }))
}

/// GET /api/historical-data
async fn historical_data(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);

    let data: Vec<SampleRecord> = state
        .broadcaster
        .history(Some(limit))
        .await
        .iter()
        .map(SampleRecord::from)
        .collect();

    Ok(Json(HistoryResponse {
        status: "success",
        count: data.len(),
        data,
    }))
}

/// GET /api/arinc429-data
async fn arinc429_data(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let snapshot = state
        .broadcaster
        .snapshot()
        .await
        .ok_or_else(|| ApiError::NotFound("No flight data available yet".to_string()))?;

    let mut body = serde_json::to_value(&snapshot).map_err(|e| ApiError::Internal(e.to_string()))?;
    if let Some(obj) = body.as_object_mut() {
        obj.insert("status".to_string(), "success".into());
    }
    Ok(Json(body))
}

/// GET /api/statistics
async fn statistics(State(state): State<AppState>) -> Json<StatisticsResponse> {
    Json(StatisticsResponse {
        status: "success",
        statistics: state.broadcaster.statistics(),
    })
}
