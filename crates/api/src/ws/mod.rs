//! WebSocket infrastructure for real-time event delivery.
//!
//! Provides the session registry, the delivery fan-out driven by the
//! publish loop, heartbeat monitoring, and the HTTP upgrade handler.

pub mod fanout;
mod handler;
mod heartbeat;
pub mod registry;

pub use fanout::Fanout;
pub use handler::{ws_handler, WsParams};
pub use heartbeat::start_heartbeat;
pub use registry::{Registration, SessionHandle, SessionRegistry};
