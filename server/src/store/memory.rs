//! In-memory endpoint store.
//!
//! Backs tests and standalone runs without a database. Optionally seeded
//! from a JSON array of endpoint records.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{Endpoint, StoreError};

/// Concurrent in-process endpoint map, keyed by public key.
#[derive(Clone, Default)]
pub struct MemoryStore {
    endpoints: Arc<DashMap<String, Endpoint>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load endpoint records from a JSON seed file.
    ///
    /// Returns the number of records loaded.
    pub fn seed_from_file(&self, path: &str) -> Result<usize, StoreError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| StoreError::Seed(e.to_string()))?;
        let records: Vec<Endpoint> =
            serde_json::from_str(&contents).map_err(|e| StoreError::Seed(e.to_string()))?;

        let count = records.len();
        for endpoint in records {
            self.insert(endpoint);
        }
        Ok(count)
    }

    /// Insert or replace an endpoint record.
    pub fn insert(&self, endpoint: Endpoint) {
        self.endpoints
            .insert(endpoint.public_key.clone(), endpoint);
    }

    /// Look up an endpoint by public key.
    #[must_use]
    pub fn get_by_key(&self, public_key: &str) -> Option<Endpoint> {
        self.endpoints.get(public_key).map(|e| e.clone())
    }

    /// Increment the event counter and stamp the delivery time.
    pub fn record_event(&self, endpoint_id: Uuid) {
        for mut entry in self.endpoints.iter_mut() {
            if entry.id == endpoint_id {
                entry.event_count += 1;
                entry.last_event_at = Some(Utc::now());
                return;
            }
        }
    }
}
