//! Shared domain types for the relay server.
//!
//! Everything here is transport-agnostic and safe to use from worker
//! threads: session identifiers, the queue snapshot handed over by the
//! scheduler, execution tracking, the node capability catalog, and the
//! on-prompt hook chain.

pub mod catalog;
pub mod error;
pub mod execution;
pub mod hooks;
pub mod queue;
pub mod types;
