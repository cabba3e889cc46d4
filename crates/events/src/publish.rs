//! Cross-context publish queue.
//!
//! [`Publisher`] is a cheap, cloneable handle over an unbounded
//! `tokio::sync::mpsc` channel. Sending never blocks and needs no
//! runtime, so worker threads outside the server's event loop can call
//! [`Publisher::publish_sync`] directly. A single [`PublishLoop`] owns
//! the receiving [`EventStream`] and delivers events one at a time, in
//! the order they were published.

use std::sync::Arc;

use relay_core::queue::QueueSource;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::delivery::EventSink;
use crate::error::EventError;
use crate::event::{Event, EventKind, Payload, Target};
use crate::status;

/// Create a connected publisher / stream pair.
pub fn channel() -> (Publisher, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Publisher { tx }, EventStream { rx })
}

/// Producer handle. Clone freely; safe to use from any thread.
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: mpsc::UnboundedSender<Event>,
}

impl Publisher {
    /// Enqueue an event and return immediately.
    ///
    /// Fails only if the publish loop has shut down.
    pub fn publish_sync(&self, event: Event) -> Result<(), EventError> {
        self.tx.send(event).map_err(|_| EventError::QueueClosed)
    }

    /// Enqueue from inside the runtime. Same queue, same ordering as
    /// [`publish_sync`](Self::publish_sync).
    pub async fn publish_async(&self, event: Event) -> Result<(), EventError> {
        self.publish_sync(event)
    }

    /// Build, validate and enqueue an event in one call.
    ///
    /// An invalid kind/payload combination is reported here and nothing
    /// is queued.
    pub fn publish(
        &self,
        kind: impl Into<EventKind>,
        payload: Payload,
        target: impl Into<Target>,
    ) -> Result<(), EventError> {
        let event = Event::new(kind, payload, target)?;
        self.publish_sync(event)
    }

    /// Enqueue a JSON text event.
    pub fn send_json(
        &self,
        kind: impl Into<String>,
        data: impl serde::Serialize,
        target: impl Into<Target>,
    ) -> Result<(), EventError> {
        self.publish_sync(Event::json(kind, data, target)?)
    }

    /// Broadcast the queue's current status to every session.
    pub fn queue_updated<Q>(&self, queue: &Q) -> Result<(), EventError>
    where
        Q: QueueSource + ?Sized,
    {
        self.publish_sync(status::status_event(queue.queue_info())?)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the publish queue.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventStream {
    /// Next event in publish order; `None` once every publisher is gone
    /// (or the stream was closed) and the buffer is drained.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Stop accepting new events. Already-queued events can still be read.
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Number of events waiting to be delivered.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

/// The single consumer of the publish queue.
pub struct PublishLoop;

impl PublishLoop {
    /// Deliver every event in FIFO order, awaiting each delivery before
    /// pulling the next.
    ///
    /// On cancellation the stream is closed and the events already queued
    /// are still delivered before returning. The loop also exits once all
    /// publishers are dropped.
    pub async fn run(mut stream: EventStream, sink: Arc<dyn EventSink>, cancel: CancellationToken) {
        tracing::info!("Publish loop started");

        loop {
            tokio::select! {
                biased;
                next = stream.next() => match next {
                    Some(event) => Self::dispatch(sink.as_ref(), event).await,
                    None => {
                        tracing::info!("All publishers dropped, publish loop shutting down");
                        return;
                    }
                },
                () = cancel.cancelled() => break,
            }
        }

        stream.close();
        let remaining = stream.pending();
        tracing::info!(remaining, "Publish loop cancelled, draining queued events");
        while let Some(event) = stream.next().await {
            Self::dispatch(sink.as_ref(), event).await;
        }
        tracing::info!("Publish loop stopped");
    }

    async fn dispatch(sink: &dyn EventSink, event: Event) {
        let kind = event.kind().clone();
        let report = sink.deliver(event).await;
        if !report.failed.is_empty() {
            tracing::debug!(
                kind = %kind,
                delivered = report.delivered,
                failed = report.failed.len(),
                "Event delivered with failures",
            );
        }
    }
}
