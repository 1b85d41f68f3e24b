//! QQ-style Ed25519 bot protocol adapter.
//!
//! The platform speaks an opcode protocol over webhooks. Two opcodes matter:
//!
//! - `13` — signature handshake: the platform sends `{plain_token, event_ts}`
//!   and expects back `{op: 13, d: {plain_token, signature}}` where the
//!   signature is Ed25519 over `event_ts + plain_token`, hex-encoded, using
//!   the seed derived from the endpoint secret.
//! - `0` — event dispatch: headers `X-Signature-Timestamp` and
//!   `X-Signature-Ed25519` sign `timestamp + rawBody`; a verified dispatch is
//!   acked with `{op: 12}` and emitted as an event.
//!
//! Every other opcode is acked without producing an event.

use hs_crypto::ed25519;
use serde::Deserialize;
use serde_json::json;

use super::{
    Adapter, AdapterError, AdapterOutcome, AdapterRequest, AdapterResponse, Provider,
};
use crate::event::CanonicalEvent;

/// Signature validation handshake.
const OP_HANDSHAKE: i64 = 13;
/// Event dispatch.
const OP_DISPATCH: i64 = 0;
/// HTTP callback ack.
const OP_ACK: i64 = 12;

/// Inbound protocol frame. Unknown opcodes keep `d` unparsed.
#[derive(Debug, Deserialize)]
struct ProtocolFrame {
    op: i64,
    #[serde(default)]
    d: serde_json::Value,
    /// Sequence number on dispatches.
    #[serde(default)]
    s: Option<i64>,
    /// Event type on dispatches.
    #[serde(default)]
    t: Option<String>,
    /// Delivery id on dispatches.
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HandshakePayload {
    plain_token: String,
    event_ts: String,
}

/// Adapter for the QQ-style Ed25519 bot protocol.
pub struct QqBotAdapter;

impl Adapter for QqBotAdapter {
    fn provider(&self) -> Provider {
        Provider::Qqbot
    }

    fn verify_and_parse(
        &self,
        request: &AdapterRequest<'_>,
    ) -> Result<AdapterOutcome, AdapterError> {
        let frame: ProtocolFrame = serde_json::from_slice(&request.body)
            .map_err(|e| AdapterError::MalformedBody(e.to_string()))?;

        match frame.op {
            OP_HANDSHAKE => handshake(request, &frame),
            OP_DISPATCH => dispatch(request, frame),
            _ => Ok(AdapterOutcome::response_only(AdapterResponse::json(
                json!({ "op": OP_ACK }),
            ))),
        }
    }
}

/// Answer the opcode-13 handshake with the signed token.
fn handshake(
    request: &AdapterRequest<'_>,
    frame: &ProtocolFrame,
) -> Result<AdapterOutcome, AdapterError> {
    let payload: HandshakePayload = serde_json::from_value(frame.d.clone())
        .map_err(|e| AdapterError::MalformedBody(e.to_string()))?;

    // The handshake always requires key material, even when verification is
    // disabled: there is nothing meaningful to answer without the secret.
    let secret = request
        .endpoint
        .secret
        .as_deref()
        .or(request.endpoint.secondary_secret.as_deref())
        .ok_or(AdapterError::MissingSecret)?;

    let message = format!("{}{}", payload.event_ts, payload.plain_token);
    let signature = ed25519::sign(secret, message.as_bytes())?;

    Ok(AdapterOutcome::response_only(AdapterResponse::json(json!({
        "op": OP_HANDSHAKE,
        "d": {
            "plain_token": payload.plain_token,
            "signature": hex::encode(signature),
        },
    }))))
}

/// Verify and normalize an opcode-0 event dispatch.
fn dispatch(
    request: &AdapterRequest<'_>,
    frame: ProtocolFrame,
) -> Result<AdapterOutcome, AdapterError> {
    if request.verification_enabled() {
        let timestamp = request
            .header("x-signature-timestamp")
            .ok_or(AdapterError::MissingHeader("X-Signature-Timestamp"))?;
        let signature_hex = request
            .header("x-signature-ed25519")
            .ok_or(AdapterError::MissingHeader("X-Signature-Ed25519"))?;
        let signature = hex::decode(signature_hex)
            .map_err(|_| AdapterError::InvalidSignature)?;

        let mut message = timestamp.as_bytes().to_vec();
        message.extend_from_slice(&request.body);

        request.check_with_secrets(|secret| {
            ed25519::verify(secret, &message, &signature).unwrap_or(false)
        })?;
    }

    let event_type = frame.t.unwrap_or_else(|| "dispatch".to_owned());
    let event = CanonicalEvent::new(
        Provider::Qqbot,
        event_type,
        frame.id,
        request.forwarded_headers(),
        &request.body,
        json!({ "opcode": OP_DISPATCH, "sequence": frame.s }),
    );

    Ok(AdapterOutcome::event(
        event,
        AdapterResponse::json(json!({ "op": OP_ACK })),
    ))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{endpoint, request};
    use super::super::ResponseBody;
    use super::*;

    const SECRET: &str = "bot_app_secret";

    fn dispatch_body() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "op": 0,
            "s": 17,
            "t": "GROUP_AT_MESSAGE_CREATE",
            "id": "evt_qq_1",
            "d": { "content": "hello" },
        }))
        .unwrap()
    }

    fn signed_headers(secret: &str, timestamp: &str, body: &[u8]) -> (String, String) {
        let mut message = timestamp.as_bytes().to_vec();
        message.extend_from_slice(body);
        let sig = ed25519::sign(secret, &message).unwrap();
        (timestamp.to_owned(), hex::encode(sig))
    }

    #[test]
    fn handshake_signs_event_ts_then_plain_token() {
        let ep = endpoint(Provider::Qqbot, Some("s"));
        let body = br#"{"op":13,"d":{"plain_token":"abc","event_ts":"123"}}"#;
        let req = request(&ep, &[], body);

        let outcome = QqBotAdapter.verify_and_parse(&req).unwrap();
        assert!(outcome.event.is_none());

        let ResponseBody::Json(value) = &outcome.response.body else {
            panic!("handshake response must be JSON");
        };
        assert_eq!(value["op"], 13);
        assert_eq!(value["d"]["plain_token"], "abc");

        let expected = hex::encode(ed25519::sign("s", b"123abc").unwrap());
        assert_eq!(value["d"]["signature"], expected);
    }

    #[test]
    fn handshake_without_secret_fails_closed() {
        let ep = endpoint(Provider::Qqbot, None);
        let body = br#"{"op":13,"d":{"plain_token":"abc","event_ts":"123"}}"#;
        let req = request(&ep, &[], body);
        assert_eq!(
            QqBotAdapter.verify_and_parse(&req).unwrap_err(),
            AdapterError::MissingSecret
        );
    }

    #[test]
    fn verified_dispatch_acks_and_emits() {
        let ep = endpoint(Provider::Qqbot, Some(SECRET));
        let body = dispatch_body();
        let (ts, sig) = signed_headers(SECRET, "1700000000", &body);
        let req = request(
            &ep,
            &[("X-Signature-Timestamp", &ts), ("X-Signature-Ed25519", &sig)],
            &body,
        );

        let outcome = QqBotAdapter.verify_and_parse(&req).unwrap();
        let event = outcome.event.unwrap();
        assert_eq!(event.event_type, "GROUP_AT_MESSAGE_CREATE");
        assert_eq!(event.id, "evt_qq_1");
        assert_eq!(event.data["opcode"], 0);
        assert_eq!(event.data["sequence"], 17);
        assert_eq!(
            outcome.response,
            AdapterResponse::json(json!({ "op": 12 }))
        );
    }

    #[test]
    fn dispatch_with_bad_signature_rejected() {
        let ep = endpoint(Provider::Qqbot, Some(SECRET));
        let body = dispatch_body();
        let (ts, sig) = signed_headers("wrong_secret", "1700000000", &body);
        let req = request(
            &ep,
            &[("X-Signature-Timestamp", &ts), ("X-Signature-Ed25519", &sig)],
            &body,
        );
        assert_eq!(
            QqBotAdapter.verify_and_parse(&req).unwrap_err(),
            AdapterError::InvalidSignature
        );
    }

    #[test]
    fn dispatch_with_wrong_timestamp_rejected() {
        let ep = endpoint(Provider::Qqbot, Some(SECRET));
        let body = dispatch_body();
        let (_, sig) = signed_headers(SECRET, "1700000000", &body);
        let req = request(
            &ep,
            &[
                ("X-Signature-Timestamp", "1700000001"),
                ("X-Signature-Ed25519", &sig),
            ],
            &body,
        );
        assert_eq!(
            QqBotAdapter.verify_and_parse(&req).unwrap_err(),
            AdapterError::InvalidSignature
        );
    }

    #[test]
    fn dispatch_missing_signature_headers_fails_closed() {
        let ep = endpoint(Provider::Qqbot, Some(SECRET));
        let body = dispatch_body();
        let req = request(&ep, &[], &body);
        assert_eq!(
            QqBotAdapter.verify_and_parse(&req).unwrap_err(),
            AdapterError::MissingHeader("X-Signature-Timestamp")
        );
    }

    #[test]
    fn non_hex_signature_rejected_without_panic() {
        let ep = endpoint(Provider::Qqbot, Some(SECRET));
        let body = dispatch_body();
        let req = request(
            &ep,
            &[
                ("X-Signature-Timestamp", "1700000000"),
                ("X-Signature-Ed25519", "zz-not-hex"),
            ],
            &body,
        );
        assert_eq!(
            QqBotAdapter.verify_and_parse(&req).unwrap_err(),
            AdapterError::InvalidSignature
        );
    }

    #[test]
    fn unknown_opcode_acked_without_event() {
        let ep = endpoint(Provider::Qqbot, Some(SECRET));
        let req = request(&ep, &[], br#"{"op":2,"d":{}}"#);
        let outcome = QqBotAdapter.verify_and_parse(&req).unwrap();
        assert!(outcome.event.is_none());
        assert_eq!(
            outcome.response,
            AdapterResponse::json(json!({ "op": 12 }))
        );
    }
}
