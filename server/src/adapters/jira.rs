//! Jira webhook adapter.
//!
//! Jira (and Atlassian-hosted variants) sign the raw body with HMAC-SHA256
//! and place the hex signature in one of several headers depending on the
//! deployment; the first present header wins, and an optional `sha256=`
//! prefix is stripped before comparison.

use hs_crypto::signing;
use serde_json::json;

use super::{
    Adapter, AdapterError, AdapterOutcome, AdapterRequest, AdapterResponse, Provider,
};
use crate::event::CanonicalEvent;

/// Signature headers in lookup priority order.
const SIGNATURE_HEADERS: [&str; 3] = [
    "x-hub-signature-256",
    "x-hub-signature",
    "x-atlassian-webhook-signature",
];

/// Adapter for Jira webhooks.
pub struct JiraAdapter;

impl Adapter for JiraAdapter {
    fn provider(&self) -> Provider {
        Provider::Jira
    }

    fn verify_and_parse(
        &self,
        request: &AdapterRequest<'_>,
    ) -> Result<AdapterOutcome, AdapterError> {
        let has_secret =
            request.endpoint.secret.is_some() || request.endpoint.secondary_secret.is_some();
        if request.verification_enabled() && has_secret {
            let signature = SIGNATURE_HEADERS
                .iter()
                .find_map(|name| request.header(name))
                .ok_or(AdapterError::MissingHeader("X-Hub-Signature-256"))?;
            let signature = signature.strip_prefix("sha256=").unwrap_or(signature);

            request.check_with_secrets(|secret| {
                signing::verify_signature(secret, &request.body, signature)
            })?;
        }

        let body: Option<serde_json::Value> = serde_json::from_slice(&request.body).ok();
        let event_type = body
            .as_ref()
            .and_then(|b| b.get("webhookEvent"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or("webhook")
            .to_owned();

        let event = CanonicalEvent::new(
            Provider::Jira,
            event_type.clone(),
            None,
            request.forwarded_headers(),
            &request.body,
            json!({ "event": event_type }),
        );

        Ok(AdapterOutcome::event(event, AdapterResponse::ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{endpoint, request};
    use super::*;

    const SECRET: &str = "jira_webhook_secret";
    const BODY: &[u8] = br#"{"webhookEvent":"jira:issue_updated"}"#;

    #[test]
    fn prefixed_signature_accepted() {
        let ep = endpoint(Provider::Jira, Some(SECRET));
        let sig = format!("sha256={}", signing::sign_payload(SECRET, BODY));
        let req = request(&ep, &[("X-Hub-Signature-256", &sig)], BODY);

        let outcome = JiraAdapter.verify_and_parse(&req).unwrap();
        assert_eq!(outcome.event.unwrap().event_type, "jira:issue_updated");
    }

    #[test]
    fn bare_signature_in_alternate_header_accepted() {
        let ep = endpoint(Provider::Jira, Some(SECRET));
        let sig = signing::sign_payload(SECRET, BODY);
        let req = request(&ep, &[("X-Atlassian-Webhook-Signature", &sig)], BODY);
        assert!(JiraAdapter.verify_and_parse(&req).is_ok());
    }

    #[test]
    fn first_present_header_wins() {
        let ep = endpoint(Provider::Jira, Some(SECRET));
        let good = signing::sign_payload(SECRET, BODY);
        // The higher-priority header carries garbage; it must be the one
        // checked, so verification fails.
        let req = request(
            &ep,
            &[
                ("X-Hub-Signature-256", "sha256=deadbeef"),
                ("X-Atlassian-Webhook-Signature", &good),
            ],
            BODY,
        );
        assert_eq!(
            JiraAdapter.verify_and_parse(&req).unwrap_err(),
            AdapterError::InvalidSignature
        );
    }

    #[test]
    fn tampered_body_rejected() {
        let ep = endpoint(Provider::Jira, Some(SECRET));
        let sig = signing::sign_payload(SECRET, BODY);
        let req = request(
            &ep,
            &[("X-Hub-Signature", &sig)],
            br#"{"webhookEvent":"jira:issue_deleted"}"#,
        );
        assert_eq!(
            JiraAdapter.verify_and_parse(&req).unwrap_err(),
            AdapterError::InvalidSignature
        );
    }

    #[test]
    fn no_configured_secret_passes() {
        let ep = endpoint(Provider::Jira, None);
        let req = request(&ep, &[], BODY);
        let outcome = JiraAdapter.verify_and_parse(&req).unwrap();
        assert_eq!(outcome.event.unwrap().event_type, "jira:issue_updated");
    }
}
