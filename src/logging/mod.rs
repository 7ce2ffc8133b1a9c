//! Structured logging pipeline.
//!
//! # Responsibilities
//! - Enrich every record with timestamp, service/env, and ambient context
//! - Normalize error objects into a stable `error` sub-object
//! - Redact sensitive fields before anything reaches the sink
//! - Render machine-readable JSON or a human-readable line
//!
//! # Design Decisions
//! - The pipeline is built once at startup from immutable configuration;
//!   each stage is a pure transformation of the record under construction
//! - One sink (stdout by default); a capturing sink exists for tests

mod pipeline;
mod record;
mod sink;

pub use pipeline::{LogEvent, LogPipeline};
pub use record::{level_for_status, ErrorResponse, Level, LoggedError};
pub use sink::{LogSink, MemorySink, StdoutSink};
