//! API Router and Application State
//!
//! Central routing configuration and shared state.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{config::Config, hub, ingress, store::EndpointStore};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Endpoint lookup store
    pub store: Arc<EndpointStore>,
    /// Per-endpoint connection hub locator
    pub hub: Arc<hub::RelayHub>,
    /// Server configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(store: EndpointStore, hub: hub::RelayHub, config: Config) -> Self {
        Self {
            store: Arc::new(store),
            hub: Arc::new(hub),
            config: Arc::new(config),
        }
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_body_size = state.config.max_body_size;

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Webhook ingest
        .route("/{provider}/{endpoint_key}", post(ingress::ingest))
        // Subscriber transports
        .route("/{provider}/{endpoint_key}/ws", get(hub::ws::handler))
        .route("/{provider}/{endpoint_key}/sse", get(hub::sse::handler))
        .route(
            "/{provider}/{endpoint_key}/status",
            get(hub::ws::status_handler),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Webhook bodies are small; the limit guards against abuse
        .layer(DefaultBodyLimit::max(max_body_size))
        // State
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    /// Service status
    status: &'static str,
    /// Number of endpoint hubs with live subscribers
    active_hubs: usize,
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        active_hubs: state.hub.hub_count().await,
    })
}
