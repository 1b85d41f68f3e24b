//! Canonical Event Model
//!
//! The provider-independent representation of an inbound webhook, built by a
//! protocol adapter and broadcast verbatim to every subscriber.

use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::adapters::Provider;

/// A normalized webhook event.
///
/// Immutable once constructed: created by an adapter, serialized once for
/// broadcast, then discarded. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalEvent {
    /// Unique per delivery; the provider's delivery id when it sends one.
    pub id: String,
    /// Source provider tag.
    pub platform: Provider,
    /// Provider-specific event type (`push`, `charge.succeeded`, ...).
    #[serde(rename = "type")]
    pub event_type: String,
    /// Milliseconds since the Unix epoch at normalization time.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    /// Request headers minus credential-bearing ones, keys lower-cased.
    pub headers: HashMap<String, String>,
    /// The received body, preserved for consumer inspection: parsed JSON
    /// when the body is JSON, otherwise the raw text.
    #[serde(rename = "payload")]
    pub raw_payload: serde_json::Value,
    /// Adapter-specific normalized fields.
    pub data: serde_json::Value,
}

impl CanonicalEvent {
    /// Build an event from the raw request pieces.
    ///
    /// `delivery_id` falls back to a generated UUIDv7 when the provider did
    /// not send one.
    #[must_use]
    pub fn new(
        platform: Provider,
        event_type: impl Into<String>,
        delivery_id: Option<String>,
        headers: HashMap<String, String>,
        body: &[u8],
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: delivery_id.unwrap_or_else(|| Uuid::now_v7().to_string()),
            platform,
            event_type: event_type.into(),
            timestamp_ms: Utc::now().timestamp_millis(),
            headers,
            raw_payload: payload_from_bytes(body),
            data,
        }
    }
}

/// Preserve a request body for consumers: a JSON value when it parses,
/// otherwise the raw text.
#[must_use]
pub fn payload_from_bytes(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(body).into_owned()))
}
