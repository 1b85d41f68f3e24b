//! Generic webhook adapter.
//!
//! Catch-all for providers without a dedicated adapter. An optional token in
//! `Authorization` (`Bearer` or raw) gates the request when a secret is
//! configured; otherwise everything is accepted. The body is parsed by
//! content type and the event type inferred from well-known payload fields
//! and headers.

use serde_json::json;

use super::{
    Adapter, AdapterError, AdapterOutcome, AdapterRequest, AdapterResponse, Provider,
};
use crate::event::CanonicalEvent;

/// Payload fields consulted for the event type, in order.
const TYPE_FIELDS: [&str; 4] = ["event", "event_type", "type", "action"];

/// Headers consulted when no payload field matches, in order.
const TYPE_HEADERS: [&str; 2] = ["x-event-type", "x-webhook-event"];

/// Catch-all adapter for unlisted providers.
pub struct GenericAdapter;

impl Adapter for GenericAdapter {
    fn provider(&self) -> Provider {
        Provider::Generic
    }

    fn verify_and_parse(
        &self,
        request: &AdapterRequest<'_>,
    ) -> Result<AdapterOutcome, AdapterError> {
        let has_secret =
            request.endpoint.secret.is_some() || request.endpoint.secondary_secret.is_some();
        if request.verification_enabled() && has_secret {
            let token = request
                .authorization_token()
                .ok_or(AdapterError::MissingHeader("Authorization"))?;

            request
                .check_with_secrets(|secret| secret == token)
                .map_err(|err| match err {
                    AdapterError::InvalidSignature => AdapterError::InvalidToken,
                    other => other,
                })?;
        }

        let payload = parse_body(request);
        let event_type = infer_event_type(request, &payload);

        let event = CanonicalEvent::new(
            Provider::Generic,
            event_type.clone(),
            None,
            request.forwarded_headers(),
            &request.body,
            json!({ "event": event_type }),
        );

        Ok(AdapterOutcome::event(event, AdapterResponse::ok()))
    }
}

/// Parse the body by declared content type: JSON, form-urlencoded, or raw
/// text.
fn parse_body(request: &AdapterRequest<'_>) -> serde_json::Value {
    let content_type = request.header("content-type").unwrap_or_default();

    if content_type.starts_with("application/json") {
        serde_json::from_slice(&request.body).unwrap_or(serde_json::Value::Null)
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        serde_urlencoded::from_bytes::<Vec<(String, String)>>(&request.body)
            .map(|pairs| {
                serde_json::Value::Object(
                    pairs
                        .into_iter()
                        .map(|(k, v)| (k, serde_json::Value::String(v)))
                        .collect(),
                )
            })
            .unwrap_or(serde_json::Value::Null)
    } else {
        serde_json::Value::String(String::from_utf8_lossy(&request.body).into_owned())
    }
}

/// Infer the event type: payload fields first, then headers, then the
/// `"webhook"` default.
fn infer_event_type(request: &AdapterRequest<'_>, payload: &serde_json::Value) -> String {
    TYPE_FIELDS
        .iter()
        .find_map(|field| payload.get(field).and_then(serde_json::Value::as_str))
        .or_else(|| {
            TYPE_HEADERS
                .iter()
                .find_map(|header| request.header(header))
        })
        .unwrap_or("webhook")
        .to_owned()
}
