//! GitHub webhook adapter.
//!
//! GitHub signs the raw request body with HMAC-SHA256 and sends the result
//! in `X-Hub-Signature-256` as `sha256=<hex>`.

use hs_crypto::signing;
use serde_json::json;

use super::{
    Adapter, AdapterError, AdapterOutcome, AdapterRequest, AdapterResponse, Provider,
};
use crate::event::CanonicalEvent;

/// Adapter for GitHub webhooks.
pub struct GithubAdapter;

impl Adapter for GithubAdapter {
    fn provider(&self) -> Provider {
        Provider::Github
    }

    fn verify_and_parse(
        &self,
        request: &AdapterRequest<'_>,
    ) -> Result<AdapterOutcome, AdapterError> {
        if request.verification_enabled() {
            let signature = request
                .header("x-hub-signature-256")
                .ok_or(AdapterError::MissingHeader("X-Hub-Signature-256"))?;
            let signature = signature
                .strip_prefix("sha256=")
                .ok_or(AdapterError::InvalidSignature)?;

            // Compare against the literal received bytes; re-serializing the
            // JSON body would break the signature.
            request
                .check_with_secrets(|secret| {
                    signing::verify_signature(secret, &request.body, signature)
                })?;
        }

        let event_type = request.header("x-github-event").unwrap_or("webhook");
        let delivery_id = request.header("x-github-delivery").map(str::to_owned);

        let event = CanonicalEvent::new(
            Provider::Github,
            event_type,
            delivery_id,
            request.forwarded_headers(),
            &request.body,
            json!({ "event": event_type }),
        );

        Ok(AdapterOutcome::event(event, AdapterResponse::ok()))
    }
}
