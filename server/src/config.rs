//! Server Configuration
//!
//! Loads configuration from environment variables.

use anyhow::{Context, Result};
use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080")
    pub bind_address: String,

    /// `PostgreSQL` connection URL; absent selects the in-memory store
    pub database_url: Option<String>,

    /// JSON seed file for the in-memory endpoint store (optional)
    pub endpoints_file: Option<String>,

    /// Maximum webhook body size in bytes (default: 5MB)
    pub max_body_size: usize,

    /// Observability settings
    pub observability: ObservabilityConfig,
}

/// OpenTelemetry and logging configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Whether OTLP export is enabled
    pub enabled: bool,

    /// OTLP collector endpoint
    pub otlp_endpoint: String,

    /// Service name reported in telemetry
    pub service_name: String,

    /// Trace sampling ratio (0.0–1.0)
    pub trace_sample_ratio: f64,

    /// Default log level filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            database_url: env::var("DATABASE_URL").ok(),
            endpoints_file: env::var("ENDPOINTS_FILE").ok(),
            max_body_size: env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5 * 1024 * 1024), // 5MB
            observability: ObservabilityConfig::from_env()?,
        })
    }

    /// Create a default configuration for testing.
    ///
    /// Uses the in-memory endpoint store and disables telemetry export.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".into(),
            database_url: None,
            endpoints_file: None,
            max_body_size: 5 * 1024 * 1024,
            observability: ObservabilityConfig {
                enabled: false,
                otlp_endpoint: String::new(),
                service_name: "hs-server-test".into(),
                trace_sample_ratio: 0.0,
                log_level: "warn".into(),
            },
        }
    }
}

impl ObservabilityConfig {
    /// Load observability settings from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            enabled: env::var("OTEL_ENABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".into()),
            service_name: env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "hs-server".into()),
            trace_sample_ratio: env::var("OTEL_TRACE_SAMPLE_RATIO")
                .ok()
                .map(|v| v.parse::<f64>())
                .transpose()
                .context("OTEL_TRACE_SAMPLE_RATIO must be a float between 0.0 and 1.0")?
                .unwrap_or(0.1),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "hs_server=info".into()),
        })
    }
}
