//! `PostgreSQL` endpoint store backend.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{Endpoint, StoreError};

/// Create the `PostgreSQL` connection pool with health configuration.
pub async fn create_pool(database_url: &str) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        // Keep minimum connections warm to prevent cold-start latency
        .min_connections(5)
        .max_connections(20)
        // Prevent hanging requests on pool exhaustion
        .acquire_timeout(Duration::from_secs(5))
        // Clean up idle connections to prevent stale connection issues
        .idle_timeout(Duration::from_secs(600))
        // Validate connections before use to catch stale/broken connections
        .test_before_acquire(true)
        .connect(database_url)
        .await?;

    info!("Connected to PostgreSQL");
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Database(e.into()))?;
    info!("Database migrations completed");
    Ok(())
}

/// Raw row shape; `provider` is stored as its lowercase tag.
#[derive(sqlx::FromRow)]
struct EndpointRow {
    id: Uuid,
    provider: String,
    public_key: String,
    secret: Option<String>,
    secondary_secret: Option<String>,
    verify_enabled: bool,
    active: bool,
    event_count: i64,
    last_event_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<EndpointRow> for Endpoint {
    type Error = StoreError;

    fn try_from(row: EndpointRow) -> Result<Self, Self::Error> {
        let provider = row
            .provider
            .parse()
            .map_err(|e| StoreError::Invalid(format!("{e}")))?;
        Ok(Self {
            id: row.id,
            provider,
            public_key: row.public_key,
            secret: row.secret,
            secondary_secret: row.secondary_secret,
            verify_enabled: row.verify_enabled,
            active: row.active,
            event_count: row.event_count,
            last_event_at: row.last_event_at,
            created_at: row.created_at,
        })
    }
}

/// Look up an endpoint by its public key.
pub async fn get_by_key(pool: &PgPool, public_key: &str) -> Result<Option<Endpoint>, StoreError> {
    let row: Option<EndpointRow> = sqlx::query_as(
        r"
        SELECT id, provider, public_key, secret, secondary_secret,
               verify_enabled, active, event_count, last_event_at, created_at
        FROM endpoints
        WHERE public_key = $1
        ",
    )
    .bind(public_key)
    .fetch_optional(pool)
    .await?;

    row.map(Endpoint::try_from).transpose()
}

/// Increment the event counter and stamp the delivery time.
pub async fn record_event(pool: &PgPool, endpoint_id: Uuid) -> Result<(), StoreError> {
    sqlx::query(
        r"
        UPDATE endpoints
        SET event_count = event_count + 1, last_event_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(endpoint_id)
    .execute(pool)
    .await?;

    Ok(())
}
