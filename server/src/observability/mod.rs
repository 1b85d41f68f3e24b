//! Observability module — OpenTelemetry tracing and logging.
//!
//! # Quick start
//!
//! ```rust,no_run
//! # use hs_server::{config::ObservabilityConfig, observability};
//! # let config = ObservabilityConfig {
//! #     enabled: false,
//! #     otlp_endpoint: String::new(),
//! #     service_name: String::new(),
//! #     trace_sample_ratio: 0.1,
//! #     log_level: String::new(),
//! # };
//! // In main(), before any logging:
//! let _otel_guard = observability::init(&config);
//! // `_otel_guard` must stay alive until the end of `main`.
//! ```

pub mod tracing;

pub use tracing::{init, OtelGuard};
