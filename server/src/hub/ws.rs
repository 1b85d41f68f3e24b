//! WebSocket subscriber transport.
//!
//! `GET /{provider}/{endpointKey}/ws?token=...` — token check before the
//! upgrade, then a welcome frame, broadcast delivery via the session's frame
//! channel, and a read loop that answers `ping` and ignores everything else.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::{ClientFrame, ControlFrame, Transport};
use crate::api::AppState;
use crate::ingress::{self, IngressError};

/// Subscriber connection query params.
#[derive(Debug, Deserialize)]
pub struct SubscriberQuery {
    /// Endpoint subscriber token, required when the endpoint has a secret
    /// and verification enabled.
    pub token: Option<String>,
}

/// WebSocket upgrade handler.
#[instrument(skip(state, ws, query), fields(provider = %provider_tag))]
pub async fn handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path((provider_tag, endpoint_key)): Path<(String, String)>,
    Query(query): Query<SubscriberQuery>,
) -> Response {
    // Resolve and authenticate before the upgrade; failures keep HTTP
    // semantics (404/403/401) instead of a dropped socket.
    let endpoint = match ingress::resolve_endpoint(&state, &provider_tag, &endpoint_key).await {
        Ok((_, endpoint)) => endpoint,
        Err(err) => return err.into_response(),
    };
    if !endpoint.subscriber_token_matches(query.token.as_deref()) {
        return IngressError::SubscriberTokenInvalid.into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, endpoint_key))
}

/// Drive one subscriber socket to completion.
async fn handle_socket(socket: WebSocket, state: AppState, endpoint_key: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let hub = state.hub.get_or_create(&endpoint_key).await;
    let (session, mut frame_rx) = hub.register_session(Transport::WebSocket).await;
    let session_id = session.session_id;

    info!(endpoint_key = %endpoint_key, session_id = %session_id, "WebSocket subscriber connected");

    // Welcome frame, queued ahead of any broadcast.
    let _ = session
        .frame_tx
        .send(ControlFrame::connected(session_id).to_json())
        .await;

    // Forward queued frames to the socket.
    let sender_handle = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
        // Channel closed (removal or reap): close the socket.
        let _ = ws_sender.close().await;
    });

    // Read loop: only `ping` is meaningful; everything else is ignored.
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Ok(ClientFrame::Ping) = serde_json::from_str::<ClientFrame>(&text) {
                    let _ = session.frame_tx.send(ControlFrame::pong().to_json()).await;
                } else {
                    debug!(session_id = %session_id, "Ignoring unrecognized client frame");
                }
            }
            Ok(Message::Close(_)) => {
                debug!(session_id = %session_id, "WebSocket closed by client");
                break;
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
            // Protocol ping/pong handled by axum.
            _ => {}
        }
    }

    sender_handle.abort();
    hub.remove_session(session_id).await;
    state.hub.cleanup_if_empty(&endpoint_key).await;

    info!(endpoint_key = %endpoint_key, session_id = %session_id, "WebSocket subscriber disconnected");
}

/// `GET /{provider}/{endpointKey}/status` — hub connection counts.
#[instrument(skip(state, query), fields(provider = %provider_tag))]
pub async fn status_handler(
    State(state): State<AppState>,
    Path((provider_tag, endpoint_key)): Path<(String, String)>,
    Query(query): Query<SubscriberQuery>,
) -> Result<axum::Json<super::HubStatus>, IngressError> {
    let (_, endpoint) = ingress::resolve_endpoint(&state, &provider_tag, &endpoint_key).await?;
    if !endpoint.subscriber_token_matches(query.token.as_deref()) {
        return Err(IngressError::SubscriberTokenInvalid);
    }

    let status = match state.hub.get(&endpoint_key).await {
        Some(hub) => hub.status().await,
        None => super::HubStatus {
            live_websockets: 0,
            tracked_sessions: 0,
        },
    };
    Ok(axum::Json(status))
}
