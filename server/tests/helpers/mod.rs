//! Reusable test helpers for HTTP integration tests.
//!
//! Provides `TestApp` for building and sending requests through the full axum
//! router over a seeded in-memory endpoint store, plus `spawn_test_server()`
//! for socket-level WebSocket/SSE tests where `tower::ServiceExt::oneshot`
//! cannot hold a live connection.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{self, Method, Request, Response};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use tokio::task::JoinHandle;
use tower::ServiceExt;
use uuid::Uuid;

use hs_server::adapters::Provider;
use hs_server::api::{create_router, AppState};
use hs_server::config::Config;
use hs_server::hub::RelayHub;
use hs_server::store::{Endpoint, EndpointStore, MemoryStore};

/// A test application wrapping the full router and its backing store.
pub struct TestApp {
    /// The full application router.
    pub router: Router,
    /// Handle to the in-memory store for seeding endpoints.
    pub store: MemoryStore,
    /// The app configuration.
    pub config: Arc<Config>,
}

impl TestApp {
    /// Create a test app over an empty in-memory store.
    pub fn new() -> Self {
        let config = Config::default_for_test();
        let store = MemoryStore::new();
        let state = AppState::new(
            EndpointStore::Memory(store.clone()),
            RelayHub::new(),
            config.clone(),
        );
        let router = create_router(state);

        Self {
            router,
            store,
            config: Arc::new(config),
        }
    }

    /// Seed an endpoint and return it.
    pub fn seed_endpoint(&self, provider: Provider, key: &str, secret: Option<&str>) -> Endpoint {
        let endpoint = Endpoint {
            id: Uuid::now_v7(),
            provider,
            public_key: key.to_owned(),
            secret: secret.map(str::to_owned),
            secondary_secret: None,
            verify_enabled: secret.is_some(),
            active: true,
            event_count: 0,
            last_event_at: None,
            created_at: Utc::now(),
        };
        self.store.insert(endpoint.clone());
        endpoint
    }

    /// Seed a deactivated endpoint.
    pub fn seed_inactive_endpoint(&self, provider: Provider, key: &str) -> Endpoint {
        let mut endpoint = self.seed_endpoint(provider, key, None);
        endpoint.active = false;
        self.store.insert(endpoint.clone());
        endpoint
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// POST a webhook body with the given headers.
    pub async fn post_webhook(
        &self,
        uri: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Response<Body> {
        let mut builder = Self::request(Method::POST, uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.oneshot(builder.body(Body::from(body.to_vec())).unwrap())
            .await
    }
}

/// Collect a response body into a JSON value.
pub async fn body_to_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is not JSON")
}

/// Collect a response body as text.
pub async fn body_to_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("failed to read body")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// A running test server bound to a random port.
pub struct TestServer {
    /// Server address (127.0.0.1:PORT).
    pub addr: SocketAddr,
    /// Base URL for HTTP requests (e.g., `http://127.0.0.1:12345`).
    pub url: String,
    /// Handle to the server task for cleanup.
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// WebSocket URL for a path on this server.
    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{path}", self.addr)
    }
}

/// Spawn a real HTTP server on a random port.
///
/// Use this instead of `oneshot` for WebSocket/SSE tests that need a live
/// connection across multiple requests.
pub async fn spawn_test_server(router: Router) -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local addr");
    let url = format!("http://{addr}");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("Test server failed");
    });

    TestServer {
        addr,
        url,
        _handle: handle,
    }
}
