//! Sentry webhook adapter.
//!
//! Sentry signs the raw body with HMAC-SHA256 and sends the hex digest in
//! `Sentry-Hook-Signature`, with no timestamp window. The resource/action
//! pair from `Sentry-Hook-Resource` and the payload classify the event.

use hs_crypto::signing;
use serde_json::json;

use super::{
    Adapter, AdapterError, AdapterOutcome, AdapterRequest, AdapterResponse, Provider,
};
use crate::event::CanonicalEvent;

/// Adapter for Sentry integration webhooks.
pub struct SentryAdapter;

impl Adapter for SentryAdapter {
    fn provider(&self) -> Provider {
        Provider::Sentry
    }

    fn verify_and_parse(
        &self,
        request: &AdapterRequest<'_>,
    ) -> Result<AdapterOutcome, AdapterError> {
        if request.verification_enabled() {
            let signature = request
                .header("sentry-hook-signature")
                .ok_or(AdapterError::MissingHeader("Sentry-Hook-Signature"))?;

            request.check_with_secrets(|secret| {
                signing::verify_signature(secret, &request.body, signature)
            })?;
        }

        let body: Option<serde_json::Value> = serde_json::from_slice(&request.body).ok();
        let resource = request.header("sentry-hook-resource");
        let action = body
            .as_ref()
            .and_then(|b| b.get("action"))
            .and_then(serde_json::Value::as_str);
        let event_type = match (resource, action) {
            (Some(resource), Some(action)) => format!("{resource}.{action}"),
            (Some(resource), None) => resource.to_owned(),
            _ => "webhook".to_owned(),
        };

        let event = CanonicalEvent::new(
            Provider::Sentry,
            event_type,
            None,
            request.forwarded_headers(),
            &request.body,
            json!({ "resource": resource, "action": action }),
        );

        Ok(AdapterOutcome::event(event, AdapterResponse::ok()))
    }
}
