//! Delivery fan-out: turns queued events into WebSocket messages.
//!
//! Sends go through each session's bounded outbound channel without
//! waiting. A client that stops reading fills only its own buffer; once it
//! is full, further events to that client are dropped and delivery to the
//! others carries on. Per-connection failures are recorded in the
//! [`DeliveryReport`] and logged; they never abort the batch.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::Message;
use relay_events::frame::{self, Frame};
use relay_events::{DeliveryReport, Event, EventError, EventSink, Target};

use crate::ws::registry::SessionRegistry;

pub struct Fanout {
    registry: Arc<SessionRegistry>,
}

impl Fanout {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Encode an event into a transport message. Preview images are
    /// re-encoded on a blocking thread.
    pub async fn encode(event: &Event) -> Result<Message, EventError> {
        let frame = if event.needs_encoding() {
            let event = event.clone();
            tokio::task::spawn_blocking(move || frame::encode(&event))
                .await
                .map_err(|e| EventError::EncodeTask(e.to_string()))??
        } else {
            frame::encode(event)?
        };
        Ok(into_message(frame))
    }
}

pub fn into_message(frame: Frame) -> Message {
    match frame {
        Frame::Binary(bytes) => Message::Binary(bytes),
        Frame::Text(text) => Message::Text(text.into()),
    }
}

#[async_trait]
impl EventSink for Fanout {
    async fn deliver(&self, event: Event) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        let targets = match event.target() {
            Target::Session(session_id) => match self.registry.lookup(session_id).await {
                Some(handle) => vec![(session_id.clone(), handle)],
                None => {
                    tracing::debug!(
                        session_id = %session_id,
                        kind = %event.kind(),
                        "Target session not connected, dropping event",
                    );
                    report.target_missing = true;
                    return report;
                }
            },
            Target::Broadcast => self.registry.all().await,
        };

        if targets.is_empty() {
            return report;
        }

        let message = match Self::encode(&event).await {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(kind = %event.kind(), error = %e, "Failed to encode event");
                report.encode_failed = true;
                return report;
            }
        };

        for (session_id, handle) in targets {
            let outcome = handle.send(message.clone());
            if let Err(e) = &outcome {
                tracing::warn!(session_id = %session_id, error = %e, "Failed to deliver event");
            }
            report.record(&session_id, outcome);
        }

        report
    }
}
