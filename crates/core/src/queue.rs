//! Queue snapshot types and the scheduler-facing [`QueueSource`] trait.
//!
//! The execution engine owns the real queue. The relay only reads it,
//! through [`QueueSource`], to build status events and the `/queue` and
//! `/prompt` responses. [`InMemoryQueue`] is the default source used by
//! the binary and by tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::types::SessionId;

/// Descriptor of a single queued unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Monotonic submission number.
    pub number: u64,
    pub prompt_id: String,
    /// The submitted prompt graph, after the on-prompt hooks ran.
    pub prompt: serde_json::Value,
    /// Session that submitted the prompt, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<SessionId>,
}

/// Read-only view of the scheduler's queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    #[serde(rename = "queue_running")]
    pub running: Vec<QueueItem>,
    #[serde(rename = "queue_pending")]
    pub pending: Vec<QueueItem>,
}

/// `{"queue_remaining": N}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecInfo {
    pub queue_remaining: usize,
}

/// `{"exec_info": {"queue_remaining": N}}`, the body of every status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueInfo {
    pub exec_info: ExecInfo,
}

impl QueueInfo {
    pub fn new(queue_remaining: usize) -> Self {
        Self {
            exec_info: ExecInfo { queue_remaining },
        }
    }
}

/// Read access to the external scheduler's queue.
///
/// Implementations must be cheap and non-blocking; they are called from
/// the connection handler on every new session.
pub trait QueueSource: Send + Sync {
    /// Current running and pending items, in order.
    fn snapshot(&self) -> QueueSnapshot;

    /// Number of items still to be processed.
    fn queue_remaining(&self) -> usize {
        let snapshot = self.snapshot();
        snapshot.running.len() + snapshot.pending.len()
    }

    fn queue_info(&self) -> QueueInfo {
        QueueInfo::new(self.queue_remaining())
    }
}

/// A queue that also accepts new prompts.
pub trait PromptQueue: QueueSource {
    /// Append a prompt to the pending list and return its descriptor.
    fn submit(&self, prompt: serde_json::Value, client_id: Option<SessionId>) -> QueueItem;
}

#[derive(Debug, Default)]
struct QueueState {
    running: Vec<QueueItem>,
    pending: VecDeque<QueueItem>,
    next_number: u64,
}

/// Thread-safe FIFO queue that an executor can drive from any thread.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a prompt to the pending list and return its descriptor.
    pub fn enqueue(&self, prompt: serde_json::Value, client_id: Option<SessionId>) -> QueueItem {
        let mut state = self.lock();
        let item = QueueItem {
            number: state.next_number,
            prompt_id: uuid::Uuid::new_v4().to_string(),
            prompt,
            client_id,
        };
        state.next_number += 1;
        state.pending.push_back(item.clone());
        item
    }

    /// Move the oldest pending item to the running list.
    pub fn start_next(&self) -> Option<QueueItem> {
        let mut state = self.lock();
        let item = state.pending.pop_front()?;
        state.running.push(item.clone());
        Some(item)
    }

    /// Drop a running item once it has finished. Returns `false` if no
    /// running item has that id.
    pub fn complete(&self, prompt_id: &str) -> bool {
        let mut state = self.lock();
        let before = state.running.len();
        state.running.retain(|item| item.prompt_id != prompt_id);
        state.running.len() != before
    }
}

impl PromptQueue for InMemoryQueue {
    fn submit(&self, prompt: serde_json::Value, client_id: Option<SessionId>) -> QueueItem {
        self.enqueue(prompt, client_id)
    }
}

impl QueueSource for InMemoryQueue {
    fn snapshot(&self) -> QueueSnapshot {
        let state = self.lock();
        QueueSnapshot {
            running: state.running.clone(),
            pending: state.pending.iter().cloned().collect(),
        }
    }

    fn queue_remaining(&self) -> usize {
        let state = self.lock();
        state.running.len() + state.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn queue_info_serializes_to_wire_shape() {
        let info = QueueInfo::new(3);
        assert_eq!(
            serde_json::to_value(info).unwrap(),
            json!({"exec_info": {"queue_remaining": 3}})
        );
    }

    #[test]
    fn enqueue_start_complete_cycle() {
        let queue = InMemoryQueue::new();
        let first = queue.enqueue(json!({"1": {}}), Some("abc".into()));
        let second = queue.enqueue(json!({"2": {}}), None);
        assert_eq!(first.number, 0);
        assert_eq!(second.number, 1);
        assert_eq!(queue.queue_remaining(), 2);

        let started = queue.start_next().expect("pending item");
        assert_eq!(started.prompt_id, first.prompt_id);

        let snapshot = queue.snapshot();
        assert_eq!(snapshot.running, vec![first.clone()]);
        assert_eq!(snapshot.pending, vec![second]);

        assert!(queue.complete(&first.prompt_id));
        assert!(!queue.complete(&first.prompt_id));
        assert_eq!(queue.queue_remaining(), 1);
    }

    #[test]
    fn start_next_on_empty_queue_is_none() {
        let queue = InMemoryQueue::new();
        assert!(queue.start_next().is_none());
        assert_eq!(queue.queue_info(), QueueInfo::new(0));
    }

    #[test]
    fn snapshot_serializes_with_queue_prefixes() {
        let queue = InMemoryQueue::new();
        queue.enqueue(json!({}), None);
        let value = serde_json::to_value(queue.snapshot()).unwrap();
        assert!(value["queue_running"].as_array().unwrap().is_empty());
        assert_eq!(value["queue_pending"].as_array().unwrap().len(), 1);
        assert!(value["queue_pending"][0].get("client_id").is_none());
    }
}
