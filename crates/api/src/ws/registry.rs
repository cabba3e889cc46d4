use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use relay_core::types::{new_session_id, SessionId, Timestamp};
use relay_events::DeliveryError;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::Sender<Message>;

/// Default number of outbound messages a connection may have waiting.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

/// Outbound handle to one live connection.
///
/// Cheap to clone; the registry hands out clones in snapshots so a
/// broadcast never holds the registry lock while sending.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Distinguishes successive connections that share a session id.
    pub connection_id: Uuid,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// When this connection was established.
    pub connected_at: Timestamp,
}

impl SessionHandle {
    /// Queue a message on the connection's writer without waiting.
    ///
    /// A full buffer means the client stopped reading; the message is
    /// dropped for this connection only.
    pub fn send(&self, message: Message) -> Result<(), DeliveryError> {
        self.sender.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => {
                DeliveryError::TransportSendFailure("outbound buffer full".into())
            }
            TrySendError::Closed(_) => DeliveryError::ConnectionClosed,
        })
    }
}

/// Result of [`SessionRegistry::register`].
#[derive(Debug)]
pub struct Registration {
    pub session_id: SessionId,
    pub connection_id: Uuid,
    /// Outbound messages for the caller to forward to the socket.
    pub receiver: mpsc::Receiver<Message>,
    /// Whether an older connection with the same id was evicted.
    pub replaced: bool,
}

/// Registry of connected sessions keyed by session id.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared between the connection handlers and the fan-out.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    outbound_buffer: usize,
}

impl SessionRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self::with_outbound_buffer(DEFAULT_OUTBOUND_BUFFER)
    }

    /// Create a registry whose connections buffer at most `capacity`
    /// outbound messages each.
    pub fn with_outbound_buffer(capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            outbound_buffer: capacity.max(1),
        }
    }

    pub fn outbound_buffer(&self) -> usize {
        self.outbound_buffer
    }

    /// Register a new connection.
    ///
    /// Reuses `requested` as the session id when given (an empty string
    /// counts as absent), otherwise mints one. An existing entry under
    /// the same id is evicted in the same critical section. The evicted
    /// connection's outbound channel closes; closing its socket is up to
    /// its own handler.
    pub async fn register(&self, requested: Option<SessionId>) -> Registration {
        self.register_with(requested, |_| Vec::new()).await
    }

    /// Register a new connection, queueing `greeting(session_id)` on its
    /// channel before the entry becomes visible to lookups and snapshots.
    ///
    /// The greeting is therefore always the first thing the connection
    /// receives, ahead of any concurrent broadcast.
    pub async fn register_with<F>(&self, requested: Option<SessionId>, greeting: F) -> Registration
    where
        F: FnOnce(&str) -> Vec<Message>,
    {
        let session_id = requested
            .filter(|id| !id.is_empty())
            .unwrap_or_else(new_session_id);
        let (tx, rx) = mpsc::channel(self.outbound_buffer);
        let handle = SessionHandle {
            connection_id: Uuid::new_v4(),
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        let connection_id = handle.connection_id;

        // Nothing else can reach this channel until the insert below.
        for message in greeting(&session_id) {
            if let Err(e) = handle.send(message) {
                tracing::warn!(session_id = %session_id, error = %e, "Greeting not queued");
            }
        }

        let previous = self
            .sessions
            .write()
            .await
            .insert(session_id.clone(), handle);

        if let Some(old) = &previous {
            tracing::info!(
                session_id = %session_id,
                old_connection = %old.connection_id,
                new_connection = %connection_id,
                "Session reconnected, evicting previous connection",
            );
        }

        Registration {
            session_id,
            connection_id,
            receiver: rx,
            replaced: previous.is_some(),
        }
    }

    /// Remove a session by id. Removing an absent id is a no-op.
    pub async fn unregister(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }

    /// Remove a session only if it still belongs to `connection_id`.
    ///
    /// A connection that was superseded by a reconnect must not remove
    /// its replacement. Returns whether an entry was removed.
    pub async fn release(&self, session_id: &str, connection_id: Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        let owned = sessions
            .get(session_id)
            .is_some_and(|handle| handle.connection_id == connection_id);
        if owned {
            sessions.remove(session_id);
        }
        owned
    }

    /// Look up the live connection for a session.
    pub async fn lookup(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Point-in-time copy of every session, taken under the read lock.
    pub async fn all(&self) -> Vec<(SessionId, SessionHandle)> {
        self.sessions
            .read()
            .await
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect()
    }

    /// Return the current number of active sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    ///
    /// Used during graceful shutdown.
    pub async fn shutdown_all(&self) {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        for handle in sessions.values() {
            let _ = handle.send(Message::Close(None));
        }
        sessions.clear();
        tracing::info!(count, "Closed all WebSocket sessions");
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        for (_, handle) in self.all().await {
            let _ = handle.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
