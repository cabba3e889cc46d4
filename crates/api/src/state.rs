use std::sync::Arc;

use relay_core::catalog::NodeCatalog;
use relay_core::execution::ExecutionTracker;
use relay_core::hooks::PromptHooks;
use relay_core::queue::PromptQueue;
use relay_events::{EventStream, ProgressReporter, Publisher};

use crate::config::ServerConfig;
use crate::ws::{Fanout, SessionRegistry};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Live WebSocket sessions.
    pub sessions: Arc<SessionRegistry>,
    /// Delivery fan-out used by the publish loop and for initial sends.
    pub fanout: Arc<Fanout>,
    /// Producer side of the cross-context publish queue.
    pub publisher: Publisher,
    /// The scheduler's queue.
    pub queue: Arc<dyn PromptQueue>,
    /// Which session owns the running prompt, and its current node.
    pub execution: Arc<ExecutionTracker>,
    /// Node capability catalog served by `/object_info`.
    pub catalog: Arc<NodeCatalog>,
    /// Hooks applied to every submitted prompt.
    pub hooks: Arc<PromptHooks>,
}

impl AppState {
    /// Wire up the object graph around the given collaborators.
    ///
    /// Returns the state together with the consumer end of the publish
    /// queue, which the caller hands to a `PublishLoop`.
    pub fn new(
        config: ServerConfig,
        queue: Arc<dyn PromptQueue>,
        catalog: NodeCatalog,
        hooks: PromptHooks,
    ) -> (Self, EventStream) {
        let sessions = Arc::new(SessionRegistry::with_outbound_buffer(
            config.outbound_buffer,
        ));
        let fanout = Arc::new(Fanout::new(Arc::clone(&sessions)));
        let (publisher, stream) = relay_events::channel();

        let state = Self {
            config: Arc::new(config),
            sessions,
            fanout,
            publisher,
            queue,
            execution: Arc::new(ExecutionTracker::new()),
            catalog: Arc::new(catalog),
            hooks: Arc::new(hooks),
        };
        (state, stream)
    }

    /// A progress reporter bound to this state's publisher and tracker,
    /// for handing to an executor.
    pub fn reporter(&self) -> ProgressReporter {
        ProgressReporter::new(self.publisher.clone(), Arc::clone(&self.execution))
    }
}
