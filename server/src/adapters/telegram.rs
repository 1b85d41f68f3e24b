//! Telegram bot webhook adapter.
//!
//! Telegram sends Update objects with an optional static secret token in
//! `X-Telegram-Bot-Api-Secret-Token`. The update type is whichever known
//! top-level field is populated, checked in a fixed priority order.

use serde_json::json;

use super::{
    Adapter, AdapterError, AdapterOutcome, AdapterRequest, AdapterResponse, Provider,
};
use crate::event::CanonicalEvent;

/// Update fields in classification priority order; first populated wins.
const UPDATE_FIELDS: [&str; 14] = [
    "message",
    "edited_message",
    "channel_post",
    "edited_channel_post",
    "inline_query",
    "chosen_inline_result",
    "callback_query",
    "shipping_query",
    "pre_checkout_query",
    "poll",
    "poll_answer",
    "my_chat_member",
    "chat_member",
    "chat_join_request",
];

/// Adapter for Telegram bot webhooks.
pub struct TelegramAdapter;

impl Adapter for TelegramAdapter {
    fn provider(&self) -> Provider {
        Provider::Telegram
    }

    fn verify_and_parse(
        &self,
        request: &AdapterRequest<'_>,
    ) -> Result<AdapterOutcome, AdapterError> {
        let has_secret =
            request.endpoint.secret.is_some() || request.endpoint.secondary_secret.is_some();
        if request.verification_enabled() && has_secret {
            let token = request
                .header("x-telegram-bot-api-secret-token")
                .ok_or(AdapterError::MissingHeader("X-Telegram-Bot-Api-Secret-Token"))?;

            request
                .check_with_secrets(|secret| secret == token)
                .map_err(|err| match err {
                    AdapterError::InvalidSignature => AdapterError::InvalidToken,
                    other => other,
                })?;
        }

        let body: serde_json::Value = serde_json::from_slice(&request.body)
            .map_err(|e| AdapterError::MalformedBody(e.to_string()))?;

        let event_type = classify_update(&body);
        let update_id = body
            .get("update_id")
            .and_then(serde_json::Value::as_i64);

        let event = CanonicalEvent::new(
            Provider::Telegram,
            event_type,
            update_id.map(|id| id.to_string()),
            request.forwarded_headers(),
            &request.body,
            json!({ "update_id": update_id }),
        );

        Ok(AdapterOutcome::event(event, AdapterResponse::ok()))
    }
}

/// Classify an Update object by its first populated known field.
fn classify_update(update: &serde_json::Value) -> &'static str {
    UPDATE_FIELDS
        .into_iter()
        .find(|field| update.get(field).is_some_and(|v| !v.is_null()))
        .unwrap_or("update")
}
