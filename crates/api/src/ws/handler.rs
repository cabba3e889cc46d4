use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use relay_events::{frame, status};
use serde::Deserialize;

use crate::state::AppState;
use crate::ws::fanout::into_message;
use crate::ws::registry::Registration;

/// Query parameters accepted on `/ws`.
#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    /// Session token from a previous connection, to resume it.
    #[serde(rename = "clientId")]
    pub client_id: Option<String>,
}

/// HTTP handler that upgrades the connection to WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, params.client_id, state))
}

/// Manage a single WebSocket connection after upgrade.
///
///   1. Registers the session, reusing `requested` if given, with the
///      status snapshot (and the executing node, if this session owns the
///      running prompt) already queued ahead of any other event.
///   2. Spawns a writer task forwarding the session's outbound channel.
///   3. Waits for close, a receive error, or the outbound channel closing
///      (eviction by a reconnect, or shutdown).
///   4. Releases the registry entry if it is still ours.
async fn handle_socket(socket: WebSocket, requested: Option<String>, state: AppState) {
    let Registration {
        session_id,
        connection_id,
        mut receiver,
        replaced,
    } = state
        .sessions
        .register_with(requested, |session_id| greeting(&state, session_id))
        .await;
    tracing::info!(
        session_id = %session_id,
        connection_id = %connection_id,
        replaced,
        "WebSocket connected",
    );

    let (mut sink, mut stream) = socket.split();

    // Writer task: forward channel messages to the WebSocket sink.
    let writer_session = session_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = receiver.recv().await {
            if let Err(e) = sink.send(msg).await {
                tracing::warn!(
                    session_id = %writer_session,
                    error = %e,
                    "WebSocket send failed",
                );
                return;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Pong(_))) => {
                    tracing::trace!(session_id = %session_id, "Pong received");
                }
                Some(Ok(_)) => {
                    // Observers do not send commands over this channel.
                }
                Some(Err(e)) => {
                    tracing::debug!(session_id = %session_id, error = %e, "WebSocket receive error");
                    break;
                }
            },
            _ = &mut send_task => {
                tracing::debug!(session_id = %session_id, "Outbound channel closed");
                break;
            }
        }
    }

    let released = state.sessions.release(&session_id, connection_id).await;
    send_task.abort();
    tracing::info!(
        session_id = %session_id,
        connection_id = %connection_id,
        released,
        "WebSocket disconnected",
    );
}

/// The queue status (with the session id) and, when this session owns
/// the running prompt, the node currently executing.
fn greeting(state: &AppState, session_id: &str) -> Vec<Message> {
    let mut events = Vec::with_capacity(2);
    match status::welcome_event(state.queue.queue_info(), session_id) {
        Ok(event) => events.push(event),
        Err(e) => tracing::error!(error = %e, "Failed to build status event"),
    }
    if let Some(node) = state.execution.resume_marker(session_id) {
        match status::executing_event(Some(node), None, session_id) {
            Ok(event) => events.push(event),
            Err(e) => tracing::error!(error = %e, "Failed to build executing event"),
        }
    }

    events
        .iter()
        .filter_map(|event| match frame::encode(event) {
            Ok(frame) => Some(into_message(frame)),
            Err(e) => {
                tracing::error!(kind = %event.kind(), error = %e, "Failed to encode greeting");
                None
            }
        })
        .collect()
}
