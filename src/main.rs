//! Beacon binary entry point.
//!
//! Starts the telemetry endpoint: ingestion, query/delete API, and the live
//! WebSocket stream, all on one listener (default port 5000).

use std::sync::Arc;

use beacon::{
    api::{self, AppState},
    BroadcastHub, ServiceConfig, TelemetryStore,
};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beacon=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting beacon");

    let config = ServiceConfig::load()?;
    tracing::info!(
        listen_addr = %config.server.listen_addr,
        store_path = %config.storage.path.display(),
        "Configuration loaded"
    );

    let store = Arc::new(TelemetryStore::open_or_create(
        config.storage.to_store_config(),
    )?);
    let stats = store.stats();
    tracing::info!(
        items = stats.item_count,
        types = stats.type_count,
        "Store opened"
    );

    let hub = Arc::new(BroadcastHub::with_buffer_size(config.stream.buffer_size));

    let app = api::router_with_limit(
        AppState::new(store, hub),
        config.server.max_body_bytes,
    );

    let listener = tokio::net::TcpListener::bind(config.server.listen_addr).await?;
    tracing::info!(addr = %config.server.listen_addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Create a shutdown signal future for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
