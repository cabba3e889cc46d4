//! Status and execution-marker events shared by the connection handler,
//! the queue routes and workers.

use relay_core::queue::QueueInfo;
use serde::Serialize;

use crate::error::EventError;
use crate::event::{Event, Target};

pub const STATUS: &str = "status";
pub const EXECUTING: &str = "executing";

/// `{"status": {"exec_info": {...}}, "sid": "..."}`
#[derive(Debug, Clone, Serialize)]
pub struct StatusData {
    pub status: QueueInfo,
    /// Only present on the first event a new session receives.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
}

/// Initial snapshot for a freshly opened session, targeted at it alone.
pub fn welcome_event(info: QueueInfo, session_id: &str) -> Result<Event, EventError> {
    Event::json(
        STATUS,
        StatusData {
            status: info,
            sid: Some(session_id.to_string()),
        },
        session_id,
    )
}

/// Queue-changed notification for every session.
pub fn status_event(info: QueueInfo) -> Result<Event, EventError> {
    Event::json(
        STATUS,
        StatusData {
            status: info,
            sid: None,
        },
        Target::Broadcast,
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutingData {
    pub node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<String>,
}

/// `{"node": ..., "prompt_id": ...}`; `node: null` means the prompt finished.
pub fn executing_event(
    node: Option<String>,
    prompt_id: Option<String>,
    target: impl Into<Target>,
) -> Result<Event, EventError> {
    Event::json(EXECUTING, ExecutingData { node, prompt_id }, target)
}
