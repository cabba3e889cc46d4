//! Worker-facing progress reporting.
//!
//! [`ProgressReporter`] is what execution code holds on to. Every method
//! is synchronous and non-blocking: it updates the shared
//! [`ExecutionTracker`] and enqueues an event through
//! [`Publisher::publish_sync`]. Events go to the session that submitted
//! the running prompt, or to everyone when there is no such session.
//!
//! Message shapes follow the protocol clients already parse:
//! `execution_start`, `executing`, `progress`, `executed`,
//! `execution_error`.

use std::sync::Arc;

use image::DynamicImage;
use relay_core::execution::ExecutionTracker;
use relay_core::types::SessionId;
use serde_json::json;

use crate::error::EventError;
use crate::event::{Event, Target};
use crate::preview::{PreviewFormat, PreviewImage};
use crate::publish::Publisher;
use crate::status;

#[derive(Debug, Clone)]
pub struct ProgressReporter {
    publisher: Publisher,
    tracker: Arc<ExecutionTracker>,
}

impl ProgressReporter {
    pub fn new(publisher: Publisher, tracker: Arc<ExecutionTracker>) -> Self {
        Self { publisher, tracker }
    }

    fn target(&self) -> Target {
        Target::from(self.tracker.client_id())
    }

    /// A prompt submitted by `client_id` started executing.
    pub fn execution_start(
        &self,
        prompt_id: &str,
        client_id: Option<SessionId>,
    ) -> Result<(), EventError> {
        self.tracker.begin(prompt_id, client_id);
        self.publisher
            .send_json("execution_start", json!({ "prompt_id": prompt_id }), self.target())
    }

    /// Nodes whose outputs were reused from cache.
    pub fn execution_cached(&self, nodes: &[String]) -> Result<(), EventError> {
        self.publisher.send_json(
            "execution_cached",
            json!({ "nodes": nodes, "prompt_id": self.tracker.prompt_id() }),
            self.target(),
        )
    }

    /// `node` is now executing.
    pub fn executing(&self, node: &str) -> Result<(), EventError> {
        self.tracker.set_node(Some(node.to_string()));
        self.publisher.publish_sync(status::executing_event(
            Some(node.to_string()),
            self.tracker.prompt_id(),
            self.target(),
        )?)
    }

    /// Step-level progress inside the current node.
    pub fn progress(&self, value: u64, max: u64) -> Result<(), EventError> {
        self.publisher.send_json(
            "progress",
            json!({ "value": value, "max": max, "prompt_id": self.tracker.prompt_id() }),
            self.target(),
        )
    }

    /// A node produced output.
    pub fn executed(&self, node: &str, output: serde_json::Value) -> Result<(), EventError> {
        self.publisher.send_json(
            "executed",
            json!({ "node": node, "output": output, "prompt_id": self.tracker.prompt_id() }),
            self.target(),
        )
    }

    /// Queue a preview image; it is downscaled and encoded during delivery.
    pub fn preview(
        &self,
        image: DynamicImage,
        format: PreviewFormat,
        max_size: Option<u32>,
    ) -> Result<(), EventError> {
        let preview = PreviewImage::new(format, image, max_size);
        self.publisher.publish_sync(Event::preview(preview, self.target()))
    }

    pub fn execution_error(
        &self,
        node_id: &str,
        exception_type: &str,
        exception_message: &str,
    ) -> Result<(), EventError> {
        let target = self.target();
        let prompt_id = self.tracker.prompt_id();
        self.tracker.finish();
        self.publisher.send_json(
            "execution_error",
            json!({
                "prompt_id": prompt_id,
                "node_id": node_id,
                "exception_type": exception_type,
                "exception_message": exception_message,
            }),
            target,
        )
    }

    /// The prompt finished: announce `executing` with a null node.
    pub fn execution_finished(&self) -> Result<(), EventError> {
        let target = self.target();
        let prompt_id = self.tracker.prompt_id();
        self.tracker.finish();
        self.publisher
            .publish_sync(status::executing_event(None, prompt_id, target)?)
    }
}
