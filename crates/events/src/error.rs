use crate::event::EventKind;

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The kind cannot carry the payload (e.g. raw bytes under a string
    /// kind). Raised when the event is built, before anything is queued.
    #[error("invalid event kind {kind} for {payload} payload")]
    InvalidEventKind {
        kind: EventKind,
        payload: &'static str,
    },

    #[error("failed to serialize event payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to encode preview image: {0}")]
    Preview(#[from] image::ImageError),

    #[error("encoding task failed: {0}")]
    EncodeTask(String),

    /// The consumer loop is gone; nothing will deliver this event.
    #[error("publish queue is closed")]
    QueueClosed,
}
