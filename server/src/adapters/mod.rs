//! Protocol Adapters
//!
//! One adapter per webhook provider. An adapter authenticates an inbound
//! request against the endpoint's secret and normalizes the provider's wire
//! format into a [`CanonicalEvent`](crate::event::CanonicalEvent), along with
//! the exact HTTP response the provider expects back (some providers require
//! a specific ack or a signed handshake payload, not a generic "OK").
//!
//! Verification is fail-closed: a missing header, malformed signature, or
//! crypto error rejects the request unless the endpoint has verification
//! disabled, in which case it is skipped entirely.

mod generic;
mod github;
mod gitlab;
mod jenkins;
mod jira;
mod qqbot;
mod sentry;
mod stripe;
mod telegram;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::CanonicalEvent;
use crate::store::Endpoint;

pub use generic::GenericAdapter;
pub use github::GithubAdapter;
pub use gitlab::GitlabAdapter;
pub use jenkins::JenkinsAdapter;
pub use jira::JiraAdapter;
pub use qqbot::QqBotAdapter;
pub use sentry::SentryAdapter;
pub use stripe::StripeAdapter;
pub use telegram::TelegramAdapter;

/// Supported webhook providers.
///
/// The lowercase name doubles as the URL path tag and the canonical event's
/// `platform` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Github,
    Gitlab,
    Stripe,
    Jenkins,
    Jira,
    Sentry,
    Telegram,
    Qqbot,
    Generic,
}

impl Provider {
    /// All providers, in registry order.
    pub const ALL: [Self; 9] = [
        Self::Github,
        Self::Gitlab,
        Self::Stripe,
        Self::Jenkins,
        Self::Jira,
        Self::Sentry,
        Self::Telegram,
        Self::Qqbot,
        Self::Generic,
    ];

    /// The lowercase wire/path tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Gitlab => "gitlab",
            Self::Stripe => "stripe",
            Self::Jenkins => "jenkins",
            Self::Jira => "jira",
            Self::Sentry => "sentry",
            Self::Telegram => "telegram",
            Self::Qqbot => "qqbot",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownProvider(s.to_owned()))
    }
}

/// Error for an unrecognized provider path tag.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown provider: {0}")]
pub struct UnknownProvider(pub String);

/// Inbound request as the adapter sees it.
///
/// `headers` keys are lower-cased; `body` is the literal received bytes.
/// HMAC schemes sign the raw body, so the adapter must never compare against
/// a re-serialized document.
#[derive(Debug)]
pub struct AdapterRequest<'a> {
    /// The stored endpoint record (read-only).
    pub endpoint: &'a Endpoint,
    /// Request headers, keys lower-cased.
    pub headers: HashMap<String, String>,
    /// Query string parameters.
    pub query: HashMap<String, String>,
    /// Exact raw request body.
    pub body: Bytes,
}

impl AdapterRequest<'_> {
    /// Header lookup by lower-cased name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Whether signature/token verification applies to this endpoint.
    #[must_use]
    pub const fn verification_enabled(&self) -> bool {
        self.endpoint.verify_enabled
    }

    /// Request headers minus credential-bearing ones, for event forwarding.
    #[must_use]
    pub fn forwarded_headers(&self) -> HashMap<String, String> {
        const DENYLIST: [&str; 4] = [
            "authorization",
            "cookie",
            "x-gitlab-token",
            "x-telegram-bot-api-secret-token",
        ];

        self.headers
            .iter()
            .filter(|(k, _)| !DENYLIST.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Run a secret-keyed check against the primary and, during rotation,
    /// the secondary secret. Fails closed when no secret is configured.
    pub fn check_with_secrets(&self, check: impl Fn(&str) -> bool) -> Result<(), AdapterError> {
        let endpoint = self.endpoint;
        if endpoint.secret.is_none() && endpoint.secondary_secret.is_none() {
            return Err(AdapterError::MissingSecret);
        }

        let matched = endpoint
            .secret
            .iter()
            .chain(endpoint.secondary_secret.iter())
            .any(|secret| check(secret));
        if matched {
            Ok(())
        } else {
            Err(AdapterError::InvalidSignature)
        }
    }

    /// Extract the token from the `Authorization` header, accepting either
    /// `Bearer <token>` or the raw token.
    #[must_use]
    pub fn authorization_token(&self) -> Option<&str> {
        let value = self.header("authorization")?;
        Some(value.strip_prefix("Bearer ").unwrap_or(value))
    }
}

/// The HTTP response an adapter instructs the router to return.
///
/// Explicit rather than inferred: several providers require an exact shape
/// (Stripe's `{"received": true}`, the QQ-style signed handshake).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response body.
    pub body: ResponseBody,
}

/// Adapter response body variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// Plain text body.
    Text(String),
    /// JSON body.
    Json(serde_json::Value),
}

impl AdapterResponse {
    /// Plain `200 OK`.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status: StatusCode::OK,
            body: ResponseBody::Text("OK".to_owned()),
        }
    }

    /// `200` with a JSON body.
    #[must_use]
    pub const fn json(value: serde_json::Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: ResponseBody::Json(value),
        }
    }
}

impl IntoResponse for AdapterResponse {
    fn into_response(self) -> Response {
        match self.body {
            ResponseBody::Text(text) => (self.status, text).into_response(),
            ResponseBody::Json(value) => (self.status, Json(value)).into_response(),
        }
    }
}

/// Result of a successful `verify_and_parse`.
///
/// `event` is `None` for control-plane exchanges that produce no broadcast
/// (the QQ-style handshake and unknown-opcode acks).
#[derive(Debug)]
pub struct AdapterOutcome {
    /// The normalized event to broadcast, if any.
    pub event: Option<CanonicalEvent>,
    /// The immediate response for the provider.
    pub response: AdapterResponse,
}

impl AdapterOutcome {
    /// Outcome carrying an event.
    #[must_use]
    pub fn event(event: CanonicalEvent, response: AdapterResponse) -> Self {
        Self {
            event: Some(event),
            response,
        }
    }

    /// Response-only outcome (handshakes, acks).
    #[must_use]
    pub const fn response_only(response: AdapterResponse) -> Self {
        Self {
            event: None,
            response,
        }
    }
}

/// Verification/parse failures, returned as values so the router picks the
/// status code. Error messages never include secret material.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdapterError {
    /// A required verification header is absent.
    #[error("Missing {0} header")]
    MissingHeader(&'static str),

    /// Signature did not match.
    #[error("Signature verification failed")]
    InvalidSignature,

    /// Static token did not match.
    #[error("Token verification failed")]
    InvalidToken,

    /// Verification is enabled but the endpoint has no secret configured.
    #[error("No verification secret configured")]
    MissingSecret,

    /// Timestamp outside the accepted replay window.
    #[error("Webhook timestamp outside the accepted window")]
    StaleTimestamp,

    /// Body could not be parsed as the provider's wire format.
    #[error("Malformed request body: {0}")]
    MalformedBody(String),
}

impl From<hs_crypto::CryptoError> for AdapterError {
    fn from(err: hs_crypto::CryptoError) -> Self {
        match err {
            // Fail closed: an unusable secret means verification cannot
            // complete, same as no secret at all.
            hs_crypto::CryptoError::EmptySecret => Self::MissingSecret,
        }
    }
}

impl AdapterError {
    /// HTTP status for this failure.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MalformedBody(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

/// A provider protocol adapter.
pub trait Adapter: Send + Sync {
    /// The provider this adapter serves.
    fn provider(&self) -> Provider;

    /// Verify the request and normalize it into a canonical event plus the
    /// provider-expected immediate response.
    fn verify_and_parse(&self, request: &AdapterRequest<'_>)
        -> Result<AdapterOutcome, AdapterError>;
}

/// Resolve the adapter for a provider. Total over [`Provider`].
#[must_use]
pub fn adapter_for(provider: Provider) -> &'static dyn Adapter {
    match provider {
        Provider::Github => &GithubAdapter,
        Provider::Gitlab => &GitlabAdapter,
        Provider::Stripe => &StripeAdapter,
        Provider::Jenkins => &JenkinsAdapter,
        Provider::Jira => &JiraAdapter,
        Provider::Sentry => &SentryAdapter,
        Provider::Telegram => &TelegramAdapter,
        Provider::Qqbot => &QqBotAdapter,
        Provider::Generic => &GenericAdapter,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for adapter unit tests.

    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    /// Endpoint with verification enabled and the given secret.
    pub fn endpoint(provider: Provider, secret: Option<&str>) -> Endpoint {
        Endpoint {
            id: Uuid::now_v7(),
            provider,
            public_key: "ep_test".to_owned(),
            secret: secret.map(str::to_owned),
            secondary_secret: None,
            verify_enabled: true,
            active: true,
            event_count: 0,
            last_event_at: None,
            created_at: Utc::now(),
        }
    }

    /// Endpoint with verification disabled.
    pub fn open_endpoint(provider: Provider) -> Endpoint {
        Endpoint {
            verify_enabled: false,
            ..endpoint(provider, None)
        }
    }

    /// Build an [`AdapterRequest`] from header pairs and a body.
    pub fn request<'a>(
        endpoint: &'a Endpoint,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> AdapterRequest<'a> {
        AdapterRequest {
            endpoint,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), (*v).to_owned()))
                .collect(),
            query: HashMap::new(),
            body: Bytes::copy_from_slice(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{endpoint, request};
    use super::*;

    #[test]
    fn provider_round_trips_through_path_tag() {
        for provider in Provider::ALL {
            assert_eq!(provider.as_str().parse::<Provider>(), Ok(provider));
        }
        assert!("bitbucket".parse::<Provider>().is_err());
    }

    #[test]
    fn registry_is_total_and_consistent() {
        for provider in Provider::ALL {
            assert_eq!(adapter_for(provider).provider(), provider);
        }
    }

    #[test]
    fn forwarded_headers_strip_credentials() {
        let ep = endpoint(Provider::Generic, Some("s"));
        let req = request(
            &ep,
            &[
                ("Authorization", "Bearer tok"),
                ("Cookie", "session=abc"),
                ("X-Gitlab-Token", "tok"),
                ("X-Event-Type", "ping"),
            ],
            b"{}",
        );

        let headers = req.forwarded_headers();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("x-event-type").map(String::as_str), Some("ping"));
    }

    #[test]
    fn secondary_secret_accepted_during_rotation() {
        let mut ep = endpoint(Provider::Sentry, Some("new"));
        ep.secondary_secret = Some("old".to_owned());
        let req = request(&ep, &[], b"{}");

        assert_eq!(req.check_with_secrets(|s| s == "old"), Ok(()));
        assert_eq!(req.check_with_secrets(|s| s == "new"), Ok(()));
        assert_eq!(
            req.check_with_secrets(|s| s == "stale"),
            Err(AdapterError::InvalidSignature)
        );
    }

    #[test]
    fn missing_secret_fails_closed() {
        let ep = endpoint(Provider::Sentry, None);
        let req = request(&ep, &[], b"{}");
        assert_eq!(
            req.check_with_secrets(|_| true),
            Err(AdapterError::MissingSecret)
        );
    }

    #[test]
    fn error_statuses() {
        assert_eq!(
            AdapterError::InvalidSignature.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AdapterError::MissingSecret.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AdapterError::MalformedBody("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
