//! The event envelope handed from publishers to the delivery loop.

use std::fmt;

use bytes::Bytes;
use relay_core::types::{SessionId, Timestamp};
use serde::Serialize;

use crate::error::EventError;
use crate::preview::PreviewImage;

/// Reserved binary event kinds.
pub mod kinds {
    /// An already-encoded preview image.
    pub const PREVIEW_IMAGE: u32 = 1;
    /// A raw preview image that must be re-encoded before sending.
    pub const UNENCODED_PREVIEW_IMAGE: u32 = 2;
}

/// Event discriminator: a binary protocol tag or a string tag.
///
/// Serializes untagged, so it appears as a bare number or string in the
/// `"type"` field of a text frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum EventKind {
    Binary(u32),
    Named(String),
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Binary(tag) => write!(f, "{tag}"),
            EventKind::Named(name) => write!(f, "{name:?}"),
        }
    }
}

impl From<u32> for EventKind {
    fn from(tag: u32) -> Self {
        EventKind::Binary(tag)
    }
}

impl From<&str> for EventKind {
    fn from(name: &str) -> Self {
        EventKind::Named(name.to_string())
    }
}

impl From<String> for EventKind {
    fn from(name: String) -> Self {
        EventKind::Named(name)
    }
}

#[derive(Debug, Clone)]
pub enum Payload {
    /// Sent as a text frame `{"type": kind, "data": value}`.
    Json(serde_json::Value),
    /// Sent verbatim after the 4-byte kind.
    Bytes(Bytes),
    /// Re-encoded, then sent as a [`kinds::PREVIEW_IMAGE`] binary frame.
    Preview(PreviewImage),
}

impl Payload {
    fn describe(&self) -> &'static str {
        match self {
            Payload::Json(_) => "json",
            Payload::Bytes(_) => "bytes",
            Payload::Preview(_) => "preview",
        }
    }
}

/// Who receives an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Broadcast,
    Session(SessionId),
}

impl From<Option<SessionId>> for Target {
    fn from(session: Option<SessionId>) -> Self {
        match session {
            Some(id) => Target::Session(id),
            None => Target::Broadcast,
        }
    }
}

impl From<SessionId> for Target {
    fn from(id: SessionId) -> Self {
        Target::Session(id)
    }
}

impl From<&str> for Target {
    fn from(id: &str) -> Self {
        Target::Session(id.to_string())
    }
}

/// An immutable, validated event.
///
/// Construction checks that the kind can carry the payload, so a bad
/// combination fails at the publish call site instead of in the
/// delivery loop.
#[derive(Debug, Clone)]
pub struct Event {
    kind: EventKind,
    payload: Payload,
    target: Target,
    created_at: Timestamp,
}

impl Event {
    pub fn new(
        kind: impl Into<EventKind>,
        payload: Payload,
        target: impl Into<Target>,
    ) -> Result<Self, EventError> {
        let kind = kind.into();
        validate(&kind, &payload)?;
        Ok(Self {
            kind,
            payload,
            target: target.into(),
            created_at: chrono::Utc::now(),
        })
    }

    /// A text event whose data is any serializable value.
    pub fn json(
        kind: impl Into<String>,
        data: impl Serialize,
        target: impl Into<Target>,
    ) -> Result<Self, EventError> {
        let data = serde_json::to_value(data)?;
        Self::new(EventKind::Named(kind.into()), Payload::Json(data), target)
    }

    /// A binary event with an opaque payload.
    pub fn bytes(
        kind: u32,
        data: impl Into<Bytes>,
        target: impl Into<Target>,
    ) -> Result<Self, EventError> {
        Self::new(EventKind::Binary(kind), Payload::Bytes(data.into()), target)
    }

    /// An unencoded preview image, re-encoded during delivery.
    pub fn preview(image: PreviewImage, target: impl Into<Target>) -> Self {
        Self {
            kind: EventKind::Binary(kinds::UNENCODED_PREVIEW_IMAGE),
            payload: Payload::Preview(image),
            target: target.into(),
            created_at: chrono::Utc::now(),
        }
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Whether delivery needs the CPU-heavy preview encoding step.
    pub fn needs_encoding(&self) -> bool {
        matches!(self.payload, Payload::Preview(_))
    }
}

fn validate(kind: &EventKind, payload: &Payload) -> Result<(), EventError> {
    let valid = match (kind, payload) {
        (EventKind::Binary(kinds::UNENCODED_PREVIEW_IMAGE), Payload::Preview(_)) => true,
        (_, Payload::Preview(_)) => false,
        (EventKind::Binary(kinds::UNENCODED_PREVIEW_IMAGE), _) => false,
        (EventKind::Binary(_), Payload::Bytes(_)) => true,
        (EventKind::Named(_), Payload::Bytes(_)) => false,
        (_, Payload::Json(_)) => true,
    };

    if valid {
        Ok(())
    } else {
        Err(EventError::InvalidEventKind {
            kind: kind.clone(),
            payload: payload.describe(),
        })
    }
}
