//! Wire frames.
//!
//! One transport message carries exactly one frame, so frames have no
//! length prefix of their own:
//!
//! ```text
//! binary: [kind: u32 big-endian][payload bytes...]
//! text:   {"type": <kind>, "data": <payload>}
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::error::EventError;
use crate::event::{kinds, Event, EventKind, Payload};
use crate::preview::encode_preview;

/// An encoded frame, ready for a transport message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Binary(Bytes),
    Text(String),
}

#[derive(Serialize)]
struct TextFrame<'a, T: Serialize> {
    #[serde(rename = "type")]
    kind: &'a EventKind,
    data: &'a T,
}

/// Prefix `payload` with `kind` as 4 big-endian bytes.
pub fn encode_binary(kind: u32, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u32(kind);
    buf.put_slice(payload);
    buf.freeze()
}

/// Serialize `{"type": kind, "data": data}` as JSON text.
pub fn encode_text<T: Serialize>(kind: &EventKind, data: &T) -> Result<String, EventError> {
    Ok(serde_json::to_string(&TextFrame { kind, data })?)
}

/// Encode an event according to its payload type.
///
/// Preview payloads are re-encoded here, which is CPU-bound; callers on
/// an async runtime should run this on a blocking thread for those.
pub fn encode(event: &Event) -> Result<Frame, EventError> {
    match (event.kind(), event.payload()) {
        (_, Payload::Preview(preview)) => {
            let image = encode_preview(preview)?;
            Ok(Frame::Binary(encode_binary(kinds::PREVIEW_IMAGE, &image)))
        }
        (EventKind::Binary(kind), Payload::Bytes(bytes)) => {
            Ok(Frame::Binary(encode_binary(*kind, bytes)))
        }
        (kind @ EventKind::Named(_), Payload::Bytes(_)) => Err(EventError::InvalidEventKind {
            kind: kind.clone(),
            payload: "bytes",
        }),
        (kind, Payload::Json(data)) => Ok(Frame::Text(encode_text(kind, data)?)),
    }
}
