//! Ingress Router
//!
//! The webhook ingest pipeline: resolve the endpoint, gate on
//! active/provider-match, delegate verification and normalization to the
//! provider adapter, fan the event out through the endpoint's hub, and
//! return the adapter's immediate response verbatim.

pub mod error;

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use bytes::Bytes;
use tracing::{info, instrument, warn};

use crate::adapters::{adapter_for, AdapterRequest, Provider};
use crate::api::AppState;
use crate::store::Endpoint;

pub use error::{ErrorResponse, IngressError, IngressResult};

/// Resolve and gate an endpoint for a request path.
///
/// Checks run in a fixed order so the status ladder is stable: unknown
/// provider (400), unknown key (404), inactive (403), provider mismatch
/// (400). The mismatch check runs before any adapter work, so a mismatched
/// request never reaches verification.
pub async fn resolve_endpoint(
    state: &AppState,
    provider_tag: &str,
    endpoint_key: &str,
) -> IngressResult<(Provider, Endpoint)> {
    let provider: Provider = provider_tag.parse()?;

    let endpoint = state
        .store
        .get_by_key(endpoint_key)
        .await?
        .ok_or(IngressError::UnknownEndpoint)?;

    if !endpoint.active {
        return Err(IngressError::EndpointInactive);
    }
    if endpoint.provider != provider {
        return Err(IngressError::ProviderMismatch);
    }

    Ok((provider, endpoint))
}

/// `POST /{provider}/{endpointKey}` — webhook ingest.
#[instrument(skip(state, headers, query, body), fields(provider = %provider_tag))]
pub async fn ingest(
    State(state): State<AppState>,
    Path((provider_tag, endpoint_key)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> IngressResult<Response> {
    let (_, endpoint) = resolve_endpoint(&state, &provider_tag, &endpoint_key).await?;

    let adapter = adapter_for(endpoint.provider);
    let request = AdapterRequest {
        endpoint: &endpoint,
        headers: lowercase_headers(&headers),
        query,
        body,
    };

    let outcome = adapter.verify_and_parse(&request).map_err(|err| {
        warn!(
            endpoint_key = %endpoint_key,
            error = %err,
            "Webhook verification failed"
        );
        err
    })?;

    if let Some(event) = outcome.event {
        // Advisory counter update; a failure is logged inside and must not
        // block delivery.
        state.store.record_event(endpoint.id).await;

        let hub = state.hub.get_or_create(&endpoint_key).await;
        let report = hub.broadcast(&event).await;

        info!(
            endpoint_key = %endpoint_key,
            event_id = %event.id,
            event_type = %event.event_type,
            success = report.success,
            failed = report.failed,
            "Webhook event relayed"
        );
    }

    Ok(axum::response::IntoResponse::into_response(outcome.response))
}

/// Collapse a `HeaderMap` into lower-cased name/value pairs.
///
/// Non-UTF-8 header values are dropped; no provider scheme uses them.
fn lowercase_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_owned()))
        })
        .collect()
}
