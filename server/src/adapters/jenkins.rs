//! Jenkins webhook adapter.
//!
//! Jenkins notification plugins send no payload signature; an optional token
//! arrives either as the `token` query parameter or in the `Authorization`
//! header (`Bearer <token>` or the raw value).

use serde_json::json;

use super::{
    Adapter, AdapterError, AdapterOutcome, AdapterRequest, AdapterResponse, Provider,
};
use crate::event::CanonicalEvent;

/// Adapter for Jenkins webhooks.
pub struct JenkinsAdapter;

impl Adapter for JenkinsAdapter {
    fn provider(&self) -> Provider {
        Provider::Jenkins
    }

    fn verify_and_parse(
        &self,
        request: &AdapterRequest<'_>,
    ) -> Result<AdapterOutcome, AdapterError> {
        let has_secret =
            request.endpoint.secret.is_some() || request.endpoint.secondary_secret.is_some();
        if request.verification_enabled() && has_secret {
            let token = request
                .query
                .get("token")
                .map(String::as_str)
                .or_else(|| request.authorization_token())
                .ok_or(AdapterError::MissingHeader("Authorization"))?;

            request
                .check_with_secrets(|secret| secret == token)
                .map_err(|err| match err {
                    AdapterError::InvalidSignature => AdapterError::InvalidToken,
                    other => other,
                })?;
        }

        let body: Option<serde_json::Value> = serde_json::from_slice(&request.body).ok();
        let job = body
            .as_ref()
            .and_then(|b| b.get("name"))
            .and_then(serde_json::Value::as_str);
        let phase = body
            .as_ref()
            .and_then(|b| b.pointer("/build/phase"))
            .and_then(serde_json::Value::as_str);

        let event = CanonicalEvent::new(
            Provider::Jenkins,
            "build",
            None,
            request.forwarded_headers(),
            &request.body,
            json!({ "job": job, "phase": phase }),
        );

        Ok(AdapterOutcome::event(event, AdapterResponse::ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{endpoint, request};
    use super::*;

    const TOKEN: &str = "jenkins_job_token";
    const BODY: &[u8] = br#"{"name":"deploy","build":{"phase":"COMPLETED"}}"#;

    #[test]
    fn query_token_accepted() {
        let ep = endpoint(Provider::Jenkins, Some(TOKEN));
        let mut req = request(&ep, &[], BODY);
        req.query.insert("token".to_owned(), TOKEN.to_owned());

        let outcome = JenkinsAdapter.verify_and_parse(&req).unwrap();
        let event = outcome.event.unwrap();
        assert_eq!(event.event_type, "build");
        assert_eq!(event.data["job"], "deploy");
        assert_eq!(event.data["phase"], "COMPLETED");
    }

    #[test]
    fn bearer_header_token_accepted() {
        let ep = endpoint(Provider::Jenkins, Some(TOKEN));
        let header = format!("Bearer {TOKEN}");
        let req = request(&ep, &[("Authorization", &header)], BODY);
        assert!(JenkinsAdapter.verify_and_parse(&req).is_ok());
    }

    #[test]
    fn raw_header_token_accepted() {
        let ep = endpoint(Provider::Jenkins, Some(TOKEN));
        let req = request(&ep, &[("Authorization", TOKEN)], BODY);
        assert!(JenkinsAdapter.verify_and_parse(&req).is_ok());
    }

    #[test]
    fn wrong_token_rejected() {
        let ep = endpoint(Provider::Jenkins, Some(TOKEN));
        let req = request(&ep, &[("Authorization", "Bearer nope")], BODY);
        assert_eq!(
            JenkinsAdapter.verify_and_parse(&req).unwrap_err(),
            AdapterError::InvalidToken
        );
    }

    #[test]
    fn missing_token_rejected_when_configured() {
        let ep = endpoint(Provider::Jenkins, Some(TOKEN));
        let req = request(&ep, &[], BODY);
        assert!(JenkinsAdapter.verify_and_parse(&req).is_err());
    }

    #[test]
    fn no_configured_token_passes() {
        let ep = endpoint(Provider::Jenkins, None);
        let req = request(&ep, &[], BODY);
        assert!(JenkinsAdapter.verify_and_parse(&req).is_ok());
    }

    #[test]
    fn non_json_body_still_accepted() {
        let ep = endpoint(Provider::Jenkins, None);
        let req = request(&ep, &[], b"build finished");
        let outcome = JenkinsAdapter.verify_and_parse(&req).unwrap();
        let event = outcome.event.unwrap();
        assert_eq!(event.data["job"], serde_json::Value::Null);
    }
}
