//! Ambient per-request context.
//!
//! # Responsibilities
//! - Carry an opaque context id, a correlation id, and free-form metadata
//!   for one logical request
//! - Make the carrier reachable from any point of the request's async call
//!   graph without explicit parameter threading
//!
//! # Design Decisions
//! - `tokio::task_local!` scoping instead of a global registry: the context
//!   follows the task tree, so interleaved requests on one worker thread
//!   never observe each other's state
//! - The carrier is an `Arc` handle; clones share one bag, so mutation from
//!   a nested operation is visible to the whole request

mod carrier;

pub use carrier::{Context, ContextSnapshot, LOG_TAGS_KEY};
