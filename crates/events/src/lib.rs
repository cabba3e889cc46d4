//! Relay event model and the cross-context publish path.
//!
//! - [`Event`]: an immutable, validated event (kind, payload, target).
//! - [`frame`]: binary (`[kind u32 BE][payload]`) and JSON text frames.
//! - [`preview`]: downscaling and re-encoding of preview images.
//! - [`Publisher`] / [`EventStream`]: the unbounded FIFO hand-off that
//!   any thread can publish into without blocking.
//! - [`PublishLoop`]: the single consumer that drains the queue in order
//!   and hands each event to an [`EventSink`].
//! - [`ProgressReporter`]: worker-facing helpers for execution progress.

pub mod delivery;
pub mod error;
pub mod event;
pub mod frame;
pub mod preview;
pub mod publish;
pub mod reporter;
pub mod status;

pub use delivery::{DeliveryError, DeliveryReport, EventSink};
pub use error::EventError;
pub use event::{kinds, Event, EventKind, Payload, Target};
pub use frame::Frame;
pub use preview::{PreviewFormat, PreviewImage};
pub use publish::{channel, EventStream, PublishLoop, Publisher};
pub use reporter::ProgressReporter;
