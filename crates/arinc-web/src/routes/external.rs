//! External sink registry endpoints.
//!
//! ### `GET /api/external-config`
//! List configured sinks in insertion order.
//!
//! ### `POST /api/external-config`
//! Add a sink.
//!
//! **Request:**
//! ```json
//! {
//!   "url": "http://localhost:8080/api/flight-data",
//!   "interval": 5,
//!   "enabled": true,
//!   "headers": { "Authorization": "Bearer token" }
//! }
//! ```
//!
//! ### `DELETE /api/external-config/:index`
//! Remove the sink at `index`. `404` when out of range, negative indices included.

use arinc_protocol::ExternalSinkConfig;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::{delete, get};
use axum::Router;
use serde::Serialize;

use crate::error::ApiError;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/external-config", get(list_configs).post(add_config))
        .route("/external-config/:index", delete(remove_config))
}

#[derive(Debug, Serialize)]
pub struct ConfigListResponse {
    pub status: &'static str,
    pub configs: Vec<ExternalSinkConfig>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub status: &'static str,
    pub message: String,
}

/// GET /api/external-config
async fn list_configs(State(state): State<AppState>) -> Json<ConfigListResponse> {
    Json(ConfigListResponse {
        status: "success",
        configs: state.broadcaster.sinks().await,
    })
}

/// POST /api/external-config
async fn add_config(
    State(state): State<AppState>,
    body: Result<Json<ExternalSinkConfig>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(config) = body?;
    let index = state.broadcaster.add_sink(config).await?;

    Ok(Json(MessageResponse {
        status: "success",
        message: format!("Configuration added at index {index}"),
    }))
}

/// DELETE /api/external-config/:index
async fn remove_config(
    State(state): State<AppState>,
    index: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(index) = index?;
    let index = usize::try_from(index)
        .map_err(|_| ApiError::NotFound(format!("No sink at index {index}")))?;
    let removed = state.broadcaster.remove_sink(index).await?;

    Ok(Json(MessageResponse {
        status: "success",
        message: format!("Configuration removed: {}", removed.url),
    }))
}
