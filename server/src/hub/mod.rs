//! Connection Hub
//!
//! Per-endpoint-key ownership of the live subscriber set. A [`RelayHub`]
//! locator hands out exactly one [`EndpointHub`] per key; the hub registers
//! WebSocket/SSE sessions, broadcasts verified events to them, and a
//! background sweep reaps sessions past the idle limit.

pub mod sse;
pub mod ws;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::event::CanonicalEvent;

/// Outbound frame buffer per session.
const SESSION_CHANNEL_CAPACITY: usize = 100;

/// Upper bound for one session delivery; a peer that cannot drain its buffer
/// within this window counts as failed for that broadcast.
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// How often the reaper sweeps sessions.
pub const REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Sessions connected longer than this are forcibly closed by the sweep.
pub const SESSION_MAX_AGE: chrono::Duration = chrono::Duration::hours(24);

/// Subscriber transport kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    WebSocket,
    Sse,
}

/// A live subscriber session.
///
/// Dropping `frame_tx`'s receiving side (or removing the session) closes the
/// connection: the transport task ends when its channel does.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Session id, unique per connection.
    pub session_id: Uuid,
    /// Transport kind.
    pub transport: Transport,
    /// Connection time, used by the idle sweep.
    pub connected_at: DateTime<Utc>,
    /// Serialized outbound frames.
    pub frame_tx: mpsc::Sender<String>,
}

/// Control frames sent to subscribers outside of event broadcast.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    /// Welcome frame after a successful WebSocket upgrade or SSE open.
    Connected {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        timestamp: i64,
    },
    /// Keepalive reply.
    Pong { timestamp: i64 },
}

impl ControlFrame {
    /// Welcome frame for a new session.
    #[must_use]
    pub fn connected(session_id: Uuid) -> Self {
        Self::Connected {
            session_id,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Pong for a client ping.
    #[must_use]
    pub fn pong() -> Self {
        Self::Pong {
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Serialize for the wire.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("control frame serialization cannot fail")
    }
}

/// Client-to-server frames. Only `ping` is recognized; everything else a
/// client sends is ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Ping,
}

/// Per-broadcast delivery tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Sessions the frame was handed to.
    pub success: usize,
    /// Sessions whose send failed or timed out.
    pub failed: usize,
}

/// Live connection counts for the status endpoint.
///
/// `live_websockets` counts sessions whose outbound channel is still open;
/// `tracked_sessions` counts session metadata entries. The two diverge while
/// a dead socket's entry waits for its read loop or the sweep to remove it.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HubStatus {
    /// WebSocket sessions with an open outbound channel.
    pub live_websockets: usize,
    /// All tracked session entries (WebSocket and SSE).
    pub tracked_sessions: usize,
}

/// The live subscriber set for one endpoint key.
pub struct EndpointHub {
    /// The endpoint public key this hub serves.
    pub endpoint_key: String,
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
}

impl EndpointHub {
    fn new(endpoint_key: String) -> Self {
        Self {
            endpoint_key,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new session and return its outbound frame receiver.
    pub async fn register_session(
        &self,
        transport: Transport,
    ) -> (SessionHandle, mpsc::Receiver<String>) {
        let (frame_tx, frame_rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        let handle = SessionHandle {
            session_id: Uuid::now_v7(),
            transport,
            connected_at: Utc::now(),
            frame_tx,
        };

        self.sessions
            .write()
            .await
            .insert(handle.session_id, handle.clone());

        debug!(
            endpoint_key = %self.endpoint_key,
            session_id = %handle.session_id,
            transport = ?transport,
            "Subscriber session registered"
        );

        (handle, frame_rx)
    }

    /// Remove a session from the live set.
    pub async fn remove_session(&self, session_id: Uuid) -> Option<SessionHandle> {
        let removed = self.sessions.write().await.remove(&session_id);
        if removed.is_some() {
            debug!(
                endpoint_key = %self.endpoint_key,
                session_id = %session_id,
                "Subscriber session removed"
            );
        }
        removed
    }

    /// Broadcast a canonical event to every live WebSocket session.
    ///
    /// The event is serialized once; sends run concurrently so one slow or
    /// dead peer never stalls its siblings. Failed sessions are counted and
    /// dropped from the live set; failures never propagate to the caller.
    ///
    /// SSE sessions are tracked and heartbeated but not pushed to here.
    pub async fn broadcast(&self, event: &CanonicalEvent) -> BroadcastReport {
        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(endpoint_key = %self.endpoint_key, error = %e, "Failed to serialize event");
                return BroadcastReport::default();
            }
        };

        // Clone sender handles to release the lock before I/O.
        let targets: Vec<(Uuid, mpsc::Sender<String>)> = {
            let sessions = self.sessions.read().await;
            sessions
                .values()
                .filter(|s| s.transport == Transport::WebSocket)
                .map(|s| (s.session_id, s.frame_tx.clone()))
                .collect()
        };

        let sends = targets.into_iter().map(|(session_id, tx)| {
            let frame = frame.clone();
            async move {
                let sent = tokio::time::timeout(SEND_TIMEOUT, tx.send(frame)).await;
                match sent {
                    Ok(Ok(())) => Ok(session_id),
                    _ => Err(session_id),
                }
            }
        });

        let mut report = BroadcastReport::default();
        let mut dead = Vec::new();
        for result in futures::future::join_all(sends).await {
            match result {
                Ok(_) => report.success += 1,
                Err(session_id) => {
                    report.failed += 1;
                    dead.push(session_id);
                }
            }
        }

        if !dead.is_empty() {
            let mut sessions = self.sessions.write().await;
            for session_id in &dead {
                sessions.remove(session_id);
            }
            warn!(
                endpoint_key = %self.endpoint_key,
                failed = report.failed,
                "Dropped unreachable subscriber sessions after broadcast"
            );
        }

        debug!(
            endpoint_key = %self.endpoint_key,
            event_id = %event.id,
            success = report.success,
            failed = report.failed,
            "Broadcast complete"
        );

        report
    }

    /// Close and remove sessions connected longer than `max_age`.
    ///
    /// Removing the handle drops the session's frame sender, which ends the
    /// transport task and closes the connection.
    pub async fn reap_idle(&self, max_age: chrono::Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.connected_at > cutoff);
        let reaped = before - sessions.len();

        if reaped > 0 {
            info!(
                endpoint_key = %self.endpoint_key,
                reaped,
                "Reaped idle subscriber sessions"
            );
        }
        reaped
    }

    /// Whether no sessions remain.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Connection counts for the status endpoint.
    pub async fn status(&self) -> HubStatus {
        let sessions = self.sessions.read().await;
        HubStatus {
            live_websockets: sessions
                .values()
                .filter(|s| s.transport == Transport::WebSocket && !s.frame_tx.is_closed())
                .count(),
            tracked_sessions: sessions.len(),
        }
    }
}

/// Locator for per-key hubs.
///
/// Guarantees the single-writer-per-key invariant in-process: all session
/// mutations for one endpoint key go through the one hub returned here.
#[derive(Default)]
pub struct RelayHub {
    hubs: RwLock<HashMap<String, Arc<EndpointHub>>>,
}

impl RelayHub {
    /// Create an empty locator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the hub for a key, creating it if absent.
    pub async fn get_or_create(&self, endpoint_key: &str) -> Arc<EndpointHub> {
        let mut hubs = self.hubs.write().await;

        if let Some(hub) = hubs.get(endpoint_key) {
            return hub.clone();
        }

        let hub = Arc::new(EndpointHub::new(endpoint_key.to_owned()));
        hubs.insert(endpoint_key.to_owned(), hub.clone());
        debug!(endpoint_key = %endpoint_key, "Created endpoint hub");
        hub
    }

    /// Get the hub for a key without creating one.
    pub async fn get(&self, endpoint_key: &str) -> Option<Arc<EndpointHub>> {
        self.hubs.read().await.get(endpoint_key).cloned()
    }

    /// Drop a hub once its session set is empty.
    pub async fn cleanup_if_empty(&self, endpoint_key: &str) {
        let mut hubs = self.hubs.write().await;
        if let Some(hub) = hubs.get(endpoint_key) {
            if hub.is_empty().await {
                hubs.remove(endpoint_key);
                debug!(endpoint_key = %endpoint_key, "Removed empty endpoint hub");
            }
        }
    }

    /// Sweep every hub once: reap over-age sessions and drop empty hubs.
    pub async fn sweep(&self, max_age: chrono::Duration) -> usize {
        let hubs: Vec<Arc<EndpointHub>> = self.hubs.read().await.values().cloned().collect();

        let mut total = 0;
        for hub in &hubs {
            total += hub.reap_idle(max_age).await;
        }

        // Second pass under the write lock to drop emptied hubs.
        let mut map = self.hubs.write().await;
        let mut empty_keys = Vec::new();
        for (key, hub) in map.iter() {
            if hub.is_empty().await {
                empty_keys.push(key.clone());
            }
        }
        for key in empty_keys {
            map.remove(&key);
        }

        total
    }

    /// Number of active hubs.
    pub async fn hub_count(&self) -> usize {
        self.hubs.read().await.len()
    }
}

/// Start the background idle-reap task.
///
/// Runs once per [`REAP_INTERVAL`]; the first tick is consumed immediately
/// so no sweep runs during startup.
pub fn spawn_reap_task(hub: Arc<RelayHub>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REAP_INTERVAL);
        interval.tick().await; // consume immediate first tick
        loop {
            interval.tick().await;
            let reaped = hub.sweep(SESSION_MAX_AGE).await;
            if reaped > 0 {
                info!(reaped, "Idle-session sweep completed");
            }
        }
    })
}
