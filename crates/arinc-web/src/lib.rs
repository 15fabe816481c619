//! # arinc-web
//!
//! REST API and WebSocket push channel for the ARINC 429 telemetry server.
//!
//! This crate provides:
//! - Read endpoints for the current sample, history and ARINC encoding
//! - Control endpoints for position reset and rate parameters
//! - External sink registry management
//! - The `/ws` push channel, one message per tick
//!
//! ## Usage
//!
//! ```rust,ignore
//! use arinc_web::{create_router, ServerState};
//!
//! let state = ServerState::new(broadcaster, settings.server.clone());
//! let app = create_router(state);
//!
//! let listener = TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod routes;
pub mod stream;

pub use error::ApiError;
pub use routes::create_router;

use std::sync::Arc;

use arinc_core::ServerSettings;
use arinc_server::TelemetryBroadcaster;

/// Shared state for all route handlers.
pub struct ServerState {
    pub broadcaster: Arc<TelemetryBroadcaster>,
    pub settings: ServerSettings,
}

impl ServerState {
    pub fn new(broadcaster: Arc<TelemetryBroadcaster>, settings: ServerSettings) -> AppState {
        Arc::new(Self {
            broadcaster,
            settings,
        })
    }
}

/// Type alias for shared state in Axum handlers.
pub type AppState = Arc<ServerState>;
