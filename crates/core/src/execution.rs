//! Tracks which session owns the unit of work currently executing.
//!
//! Written by worker threads as execution advances and read by the
//! connection handler so a reconnecting client can be told which node is
//! running right now.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::SessionId;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct ExecutionState {
    client_id: Option<SessionId>,
    prompt_id: Option<String>,
    last_node_id: Option<String>,
}

#[derive(Debug, Default)]
pub struct ExecutionTracker {
    state: Mutex<ExecutionState>,
}

impl ExecutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ExecutionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that `prompt_id`, submitted by `client_id`, started executing.
    pub fn begin(&self, prompt_id: impl Into<String>, client_id: Option<SessionId>) {
        let mut state = self.lock();
        state.prompt_id = Some(prompt_id.into());
        state.client_id = client_id;
        state.last_node_id = None;
    }

    /// Record the node now executing (`None` once the prompt is done).
    pub fn set_node(&self, node_id: Option<String>) {
        self.lock().last_node_id = node_id;
    }

    pub fn finish(&self) {
        *self.lock() = ExecutionState::default();
    }

    /// Session that owns the in-progress work, if any.
    pub fn client_id(&self) -> Option<SessionId> {
        self.lock().client_id.clone()
    }

    pub fn prompt_id(&self) -> Option<String> {
        self.lock().prompt_id.clone()
    }

    /// The node to re-announce to `session_id` on reconnect: only set when
    /// that session owns the running work and a node is executing.
    pub fn resume_marker(&self, session_id: &str) -> Option<String> {
        let state = self.lock();
        match (&state.client_id, &state.last_node_id) {
            (Some(owner), Some(node)) if owner == session_id => Some(node.clone()),
            _ => None,
        }
    }
}
