//! HTTP route handlers.
//!
//! Routes are organized as:
//! - `/` - discovery document
//! - `/api/...` - flight data, control and external sink endpoints
//! - `/ws` - push channel

pub mod control;
pub mod external;
pub mod flight;

use axum::{response::Json, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::stream;
use crate::AppState;

/// Create the main Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(discovery_handler))
        .nest("/api", api_routes())
        .route("/ws", get(stream::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(flight::routes())
        .merge(control::routes())
        .merge(external::routes())
}

/// Handler for `/` discovery endpoint.
async fn discovery_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "ARINC 429 Flight Data API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "current_data": "/api/current-data",
            "historical_data": "/api/historical-data",
            "arinc429_data": "/api/arinc429-data",
            "reset_position": "/api/reset-position",
            "set_flight_parameters": "/api/set-flight-parameters",
            "external_config": "/api/external-config",
            "statistics": "/api/statistics",
            "websocket": "/ws"
        }
    }))
}
