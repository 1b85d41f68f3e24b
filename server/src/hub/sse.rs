//! SSE subscriber transport.
//!
//! `GET /{provider}/{endpointKey}/sse?token=...` — a chunked
//! `text/event-stream` that emits an initial `connected` event and then
//! comment-only heartbeats every 30 seconds.
//!
//! SSE sessions are registered in the hub's session set but broadcast does
//! not push events to them; subscribers wanting event delivery use the
//! WebSocket transport. The session entry keeps the connection visible to
//! the status endpoint and subject to the idle sweep.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::Stream;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::ws::SubscriberQuery;
use super::{ControlFrame, EndpointHub, Transport};
use crate::api::AppState;
use crate::ingress::{self, IngressError};

/// Heartbeat interval for comment frames.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// SSE stream handler.
#[instrument(skip(state, query), fields(provider = %provider_tag))]
pub async fn handler(
    State(state): State<AppState>,
    Path((provider_tag, endpoint_key)): Path<(String, String)>,
    Query(query): Query<SubscriberQuery>,
) -> Response {
    let endpoint = match ingress::resolve_endpoint(&state, &provider_tag, &endpoint_key).await {
        Ok((_, endpoint)) => endpoint,
        Err(err) => return err.into_response(),
    };
    if !endpoint.subscriber_token_matches(query.token.as_deref()) {
        return IngressError::SubscriberTokenInvalid.into_response();
    }

    let hub = state.hub.get_or_create(&endpoint_key).await;
    let (session, frame_rx) = hub.register_session(Transport::Sse).await;
    let session_id = session.session_id;

    info!(endpoint_key = %endpoint_key, session_id = %session_id, "SSE subscriber connected");

    let guard = SessionGuard {
        relay: state.hub.clone(),
        hub,
        endpoint_key,
        session_id,
    };

    let connected = Event::default()
        .event("connected")
        .data(ControlFrame::connected(session_id).to_json());

    Sse::new(session_stream(connected, guard, frame_rx))
        .keep_alive(
            KeepAlive::new()
                .interval(HEARTBEAT_INTERVAL)
                .text("heartbeat"),
        )
        .into_response()
}

/// Removes the session from the hub when the client disconnects and the
/// stream is dropped.
struct SessionGuard {
    relay: Arc<super::RelayHub>,
    hub: Arc<EndpointHub>,
    endpoint_key: String,
    session_id: Uuid,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let relay = self.relay.clone();
        let hub = self.hub.clone();
        let endpoint_key = std::mem::take(&mut self.endpoint_key);
        let session_id = self.session_id;

        tokio::spawn(async move {
            hub.remove_session(session_id).await;
            relay.cleanup_if_empty(&endpoint_key).await;
            debug!(endpoint_key = %endpoint_key, session_id = %session_id, "SSE subscriber disconnected");
        });
    }
}

/// The per-session stream: the `connected` event, then silence until the
/// session's frame channel is closed (removal or idle reap), which ends the
/// stream and with it the HTTP response.
///
/// Broadcast frames arriving on `frame_rx` are drained and dropped rather
/// than emitted; keep-alive comments come from the `Sse` layer.
fn session_stream(
    connected: Event,
    guard: SessionGuard,
    frame_rx: tokio::sync::mpsc::Receiver<String>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    struct StreamState {
        first: Option<Event>,
        // Held so the session is removed when the stream is dropped.
        _guard: SessionGuard,
        frame_rx: tokio::sync::mpsc::Receiver<String>,
    }

    futures::stream::unfold(
        StreamState {
            first: Some(connected),
            _guard: guard,
            frame_rx,
        },
        |mut state| async move {
            if let Some(event) = state.first.take() {
                return Some((Ok(event), state));
            }
            // Wait for channel close (removal or reap); discard any
            // broadcast frames that arrive meanwhile.
            while state.frame_rx.recv().await.is_some() {}
            None
        },
    )
}
