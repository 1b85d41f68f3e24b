//! Stripe webhook adapter.
//!
//! The `Stripe-Signature` header carries `t=<unix_ts>,v1=<hex>[,v0=...]`.
//! The signed payload is `"<t>.<rawBody>"`; signatures older (or newer) than
//! the replay window are rejected even when the HMAC matches.

use chrono::Utc;
use hs_crypto::signing;
use serde_json::json;

use super::{
    Adapter, AdapterError, AdapterOutcome, AdapterRequest, AdapterResponse, Provider,
};
use crate::event::CanonicalEvent;

/// Accepted clock skew between the signature timestamp and now, in seconds.
const REPLAY_WINDOW_SECS: i64 = 300;

/// Adapter for Stripe webhooks.
pub struct StripeAdapter;

impl Adapter for StripeAdapter {
    fn provider(&self) -> Provider {
        Provider::Stripe
    }

    fn verify_and_parse(
        &self,
        request: &AdapterRequest<'_>,
    ) -> Result<AdapterOutcome, AdapterError> {
        if request.verification_enabled() {
            let header = request
                .header("stripe-signature")
                .ok_or(AdapterError::MissingHeader("Stripe-Signature"))?;
            let parsed = parse_signature_header(header)?;

            let now = Utc::now().timestamp();
            if (now - parsed.timestamp).abs() > REPLAY_WINDOW_SECS {
                return Err(AdapterError::StaleTimestamp);
            }

            let mut signed_payload =
                Vec::with_capacity(header.len() + 1 + request.body.len());
            signed_payload.extend_from_slice(parsed.timestamp.to_string().as_bytes());
            signed_payload.push(b'.');
            signed_payload.extend_from_slice(&request.body);

            request.check_with_secrets(|secret| {
                parsed
                    .v1_candidates
                    .iter()
                    .any(|sig| signing::verify_signature(secret, &signed_payload, sig))
            })?;
        }

        let body: serde_json::Value = serde_json::from_slice(&request.body)
            .map_err(|e| AdapterError::MalformedBody(e.to_string()))?;
        let event_type = body
            .get("type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("webhook")
            .to_owned();
        let delivery_id = body
            .get("id")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned);

        let event = CanonicalEvent::new(
            Provider::Stripe,
            event_type.clone(),
            delivery_id,
            request.forwarded_headers(),
            &request.body,
            json!({ "event": event_type, "livemode": body.get("livemode") }),
        );

        Ok(AdapterOutcome::event(
            event,
            AdapterResponse::json(json!({ "received": true })),
        ))
    }
}

/// Parsed `Stripe-Signature` header.
struct ParsedSignature {
    timestamp: i64,
    /// All `v1` values; any match passes (rotation overlap).
    v1_candidates: Vec<String>,
}

fn parse_signature_header(header: &str) -> Result<ParsedSignature, AdapterError> {
    let mut timestamp = None;
    let mut v1_candidates = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(value.parse::<i64>().map_err(|_| {
                    AdapterError::MalformedBody("Unparseable signature timestamp".to_owned())
                })?);
            }
            "v1" => v1_candidates.push(value.to_owned()),
            // v0 and unknown schemes are ignored
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(AdapterError::InvalidSignature)?;
    if v1_candidates.is_empty() {
        return Err(AdapterError::InvalidSignature);
    }

    Ok(ParsedSignature {
        timestamp,
        v1_candidates,
    })
}

#[cfg(test)]
mod tests {
    use super::super::testing::{endpoint, request};
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"id":"evt_1","type":"charge.succeeded","livemode":false}"#;

    fn signature_header(secret: &str, body: &[u8], timestamp: i64) -> String {
        let mut payload = timestamp.to_string().into_bytes();
        payload.push(b'.');
        payload.extend_from_slice(body);
        format!("t={timestamp},v1={}", signing::sign_payload(secret, &payload))
    }

    #[test]
    fn fresh_signature_accepted() {
        let ep = endpoint(Provider::Stripe, Some(SECRET));
        let header = signature_header(SECRET, BODY, Utc::now().timestamp());
        let req = request(&ep, &[("Stripe-Signature", &header)], BODY);

        let outcome = StripeAdapter.verify_and_parse(&req).unwrap();
        let event = outcome.event.unwrap();
        assert_eq!(event.event_type, "charge.succeeded");
        assert_eq!(event.id, "evt_1");
        assert_eq!(
            outcome.response,
            AdapterResponse::json(json!({ "received": true }))
        );
    }

    #[test]
    fn timestamp_at_window_edge_accepted() {
        let ep = endpoint(Provider::Stripe, Some(SECRET));
        let header = signature_header(SECRET, BODY, Utc::now().timestamp() - 300);
        let req = request(&ep, &[("Stripe-Signature", &header)], BODY);
        assert!(StripeAdapter.verify_and_parse(&req).is_ok());
    }

    #[test]
    fn timestamp_past_window_rejected() {
        let ep = endpoint(Provider::Stripe, Some(SECRET));
        let header = signature_header(SECRET, BODY, Utc::now().timestamp() - 301);
        let req = request(&ep, &[("Stripe-Signature", &header)], BODY);
        assert_eq!(
            StripeAdapter.verify_and_parse(&req).unwrap_err(),
            AdapterError::StaleTimestamp
        );
    }

    #[test]
    fn wrong_secret_rejected() {
        let ep = endpoint(Provider::Stripe, Some("whsec_other"));
        let header = signature_header(SECRET, BODY, Utc::now().timestamp());
        let req = request(&ep, &[("Stripe-Signature", &header)], BODY);
        assert_eq!(
            StripeAdapter.verify_and_parse(&req).unwrap_err(),
            AdapterError::InvalidSignature
        );
    }

    #[test]
    fn missing_v1_fails_closed() {
        let ep = endpoint(Provider::Stripe, Some(SECRET));
        let header = format!("t={}", Utc::now().timestamp());
        let req = request(&ep, &[("Stripe-Signature", &header)], BODY);
        assert_eq!(
            StripeAdapter.verify_and_parse(&req).unwrap_err(),
            AdapterError::InvalidSignature
        );
    }

    #[test]
    fn missing_timestamp_fails_closed() {
        let ep = endpoint(Provider::Stripe, Some(SECRET));
        let req = request(&ep, &[("Stripe-Signature", "v1=deadbeef")], BODY);
        assert_eq!(
            StripeAdapter.verify_and_parse(&req).unwrap_err(),
            AdapterError::InvalidSignature
        );
    }

    #[test]
    fn unparseable_timestamp_fails_closed() {
        let ep = endpoint(Provider::Stripe, Some(SECRET));
        let req = request(&ep, &[("Stripe-Signature", "t=soon,v1=deadbeef")], BODY);
        assert!(matches!(
            StripeAdapter.verify_and_parse(&req).unwrap_err(),
            AdapterError::MalformedBody(_)
        ));
    }

    #[test]
    fn second_v1_candidate_accepted() {
        let ep = endpoint(Provider::Stripe, Some(SECRET));
        let ts = Utc::now().timestamp();
        let good = signature_header(SECRET, BODY, ts);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={ts},v1={},v1={good_sig}", "0".repeat(64));
        let req = request(&ep, &[("Stripe-Signature", &header)], BODY);
        assert!(StripeAdapter.verify_and_parse(&req).is_ok());
    }
}
