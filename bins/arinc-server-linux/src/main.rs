use std::sync::Arc;

use anyhow::Context;
use arinc_core::{FlightDynamics, Settings};
use arinc_server::TelemetryBroadcaster;
use arinc_web::{create_router, ServerState};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,arinc_server=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("ARINC 429 telemetry server starting...");

    let settings = Settings::from_env().context("invalid configuration")?;
    tracing::info!(
        interval_ms = settings.simulation.tick_interval.as_millis() as u64,
        history = settings.simulation.history_capacity,
        rate_mode = ?settings.simulation.rate_mode,
        waypoints = settings.simulation.waypoints.len(),
        "Loaded settings"
    );

    let simulator = FlightDynamics::new(&settings.simulation);
    let broadcaster = Arc::new(
        TelemetryBroadcaster::new(settings.simulation.clone(), simulator)
            .context("failed to create broadcaster")?,
    );
    let handle = broadcaster.start();

    let state = ServerState::new(Arc::clone(&broadcaster), settings.server.clone());
    let app = create_router(state);

    let addr = settings.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("Server ready");
    tracing::info!("   HTTP API:  http://{}/api/current-data", addr);
    tracing::info!("   WebSocket: ws://{}/ws", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // stop the tick loop even if the HTTP server failed
    handle.stop().await;
    served.context("HTTP server error")?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C, shutting down..."),
        Err(e) => {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
