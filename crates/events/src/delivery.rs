//! Delivery outcomes and the seam between the publish loop and the
//! transport-owning fan-out.

use async_trait::async_trait;
use relay_core::types::SessionId;

use crate::event::Event;

/// Why a single connection did not get a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The connection's outbound channel is gone (socket already closed).
    #[error("connection closed")]
    ConnectionClosed,

    #[error("transport send failure: {0}")]
    TransportSendFailure(String),
}

/// Aggregated result of delivering one event. Failures are collected,
/// never short-circuited.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: Vec<(SessionId, DeliveryError)>,
    /// Set when a targeted session was not registered.
    pub target_missing: bool,
    /// Set when the event could not be encoded, so nothing was sent.
    pub encode_failed: bool,
}

impl DeliveryReport {
    pub fn record(&mut self, session_id: &str, outcome: Result<(), DeliveryError>) {
        match outcome {
            Ok(()) => self.delivered += 1,
            Err(e) => self.failed.push((session_id.to_string(), e)),
        }
    }

    pub fn attempted(&self) -> usize {
        self.delivered + self.failed.len()
    }
}

/// Performs the actual delivery of an event to live connections.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver `event` to its target(s). Must not fail as a whole:
    /// per-connection problems are reported, not raised.
    async fn deliver(&self, event: Event) -> DeliveryReport;
}
