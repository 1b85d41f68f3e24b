//! Endpoint Store
//!
//! The minimal endpoint-lookup collaborator. Endpoint records are owned by
//! the provisioning layer; the relay core only reads them by public key and
//! advisory-writes the usage counters.

mod memory;
mod postgres;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::adapters::Provider;
use crate::config::Config;

pub use memory::MemoryStore;
pub use postgres::{create_pool, run_migrations};

/// A provisioned webhook endpoint.
///
/// Read-only to the relay core apart from `event_count`/`last_event_at`.
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    /// Record id.
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    /// The provider this endpoint accepts.
    pub provider: Provider,
    /// Public random key; the URL path segment.
    pub public_key: String,
    /// Verification secret.
    #[serde(default)]
    pub secret: Option<String>,
    /// Alternate secret accepted during rotation.
    #[serde(default)]
    pub secondary_secret: Option<String>,
    /// When false, adapter verification is skipped entirely.
    #[serde(default = "default_true")]
    pub verify_enabled: bool,
    /// Inactive endpoints reject all traffic.
    #[serde(default = "default_true")]
    pub active: bool,
    /// Lifetime delivered-event counter (advisory).
    #[serde(default)]
    pub event_count: i64,
    /// Last delivery timestamp (advisory).
    #[serde(default)]
    pub last_event_at: Option<DateTime<Utc>>,
    /// Provisioning time.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

const fn default_true() -> bool {
    true
}

impl Endpoint {
    /// Whether subscriber connections must present a token.
    #[must_use]
    pub const fn requires_subscriber_token(&self) -> bool {
        self.verify_enabled && self.secret.is_some()
    }

    /// Check a presented subscriber token against the configured secrets.
    #[must_use]
    pub fn subscriber_token_matches(&self, token: Option<&str>) -> bool {
        if !self.requires_subscriber_token() {
            return true;
        }
        let Some(token) = token else {
            return false;
        };
        self.secret
            .iter()
            .chain(self.secondary_secret.iter())
            .any(|secret| secret == token)
    }
}

/// Store error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database failure.
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    /// Seed file could not be read or parsed.
    #[error("Endpoint seed file error: {0}")]
    Seed(String),

    /// A stored record does not decode into the expected shape.
    #[error("Invalid stored endpoint record: {0}")]
    Invalid(String),
}

/// Endpoint lookup backends.
///
/// Postgres for deployments; the in-memory map for tests and standalone runs
/// without a database.
#[derive(Clone)]
pub enum EndpointStore {
    /// `PostgreSQL`-backed store.
    Postgres(sqlx::PgPool),
    /// In-process store, optionally seeded from a JSON file.
    Memory(MemoryStore),
}

impl EndpointStore {
    /// Build the store selected by configuration.
    ///
    /// A configured `DATABASE_URL` selects Postgres (pool + migrations);
    /// otherwise the memory store is used, seeded from `ENDPOINTS_FILE` when
    /// set.
    pub async fn connect(config: &Config) -> Result<Self, StoreError> {
        if let Some(database_url) = &config.database_url {
            let pool = postgres::create_pool(database_url).await?;
            postgres::run_migrations(&pool).await?;
            return Ok(Self::Postgres(pool));
        }

        let store = MemoryStore::new();
        if let Some(path) = &config.endpoints_file {
            let seeded = store.seed_from_file(path)?;
            tracing::info!(count = seeded, path = %path, "Seeded in-memory endpoint store");
        }
        Ok(Self::Memory(store))
    }

    /// Look up an endpoint by its public key.
    pub async fn get_by_key(&self, public_key: &str) -> Result<Option<Endpoint>, StoreError> {
        match self {
            Self::Postgres(pool) => postgres::get_by_key(pool, public_key).await,
            Self::Memory(store) => Ok(store.get_by_key(public_key)),
        }
    }

    /// Increment the endpoint's event counter and stamp the delivery time.
    ///
    /// Best-effort: failures are logged and swallowed so a counter problem
    /// never blocks delivery.
    pub async fn record_event(&self, endpoint_id: Uuid) {
        let result = match self {
            Self::Postgres(pool) => postgres::record_event(pool, endpoint_id).await,
            Self::Memory(store) => {
                store.record_event(endpoint_id);
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!(endpoint_id = %endpoint_id, error = %e, "Failed to record event counter");
        }
    }
}
