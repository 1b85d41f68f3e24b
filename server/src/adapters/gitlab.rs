//! GitLab webhook adapter.
//!
//! GitLab authenticates with a static token in `X-Gitlab-Token`; there is
//! no payload signature. The event type comes from `X-Gitlab-Event`
//! (`"Push Hook"` becomes `push_hook`).

use serde_json::json;

use super::{
    Adapter, AdapterError, AdapterOutcome, AdapterRequest, AdapterResponse, Provider,
};
use crate::event::CanonicalEvent;

/// Adapter for GitLab webhooks.
pub struct GitlabAdapter;

impl Adapter for GitlabAdapter {
    fn provider(&self) -> Provider {
        Provider::Gitlab
    }

    fn verify_and_parse(
        &self,
        request: &AdapterRequest<'_>,
    ) -> Result<AdapterOutcome, AdapterError> {
        if request.verification_enabled() {
            let token = request
                .header("x-gitlab-token")
                .ok_or(AdapterError::MissingHeader("X-Gitlab-Token"))?;

            request
                .check_with_secrets(|secret| secret == token)
                .map_err(|err| match err {
                    AdapterError::InvalidSignature => AdapterError::InvalidToken,
                    other => other,
                })?;
        }

        let event_type = request
            .header("x-gitlab-event")
            .map_or_else(|| "webhook".to_owned(), normalize_event_name);

        let event = CanonicalEvent::new(
            Provider::Gitlab,
            event_type.clone(),
            None,
            request.forwarded_headers(),
            &request.body,
            json!({ "event": event_type }),
        );

        Ok(AdapterOutcome::event(event, AdapterResponse::ok()))
    }
}

/// Lower-case the GitLab event name and replace spaces with underscores.
fn normalize_event_name(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}
