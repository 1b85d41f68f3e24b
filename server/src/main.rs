//! Hookstream Server - Main Entry Point
//!
//! Webhook relay backend: ingest, verify, and fan out provider events to
//! live subscribers.

use anyhow::Result;
use std::net::SocketAddr;
use tracing::info;

use hs_server::{api, config, hub, observability, store};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    // Initialize tracing; the guard must live until the end of main
    let _otel_guard = observability::init(&config.observability);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Hookstream Server"
    );

    // Initialize the endpoint store (Postgres or in-memory per config)
    let store = store::EndpointStore::connect(&config).await?;
    match &store {
        store::EndpointStore::Postgres(_) => info!("Endpoint store: PostgreSQL"),
        store::EndpointStore::Memory(_) => info!("Endpoint store: in-memory"),
    }

    // Build application state
    let state = api::AppState::new(store, hub::RelayHub::new(), config.clone());

    // Start the idle-session reaper
    let _reaper = hub::spawn_reap_task(state.hub.clone());

    // Build router
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await?;

    info!("Server shutdown complete");

    Ok(())
}
