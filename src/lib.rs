//! Ambient HTTP observability layer.
//!
//! Propagates a correlation identifier across an entire logical request,
//! including calls the process makes to downstream services, and captures
//! full request/response traffic into structured log records without
//! call-site changes.
//!
//! ```text
//!   inbound request ──▶ InboundInspectorLayer ──▶ handler
//!        │                     │                     │
//!        │              Context::scope        InspectedClient ──▶ upstream
//!        │                     │                     │
//!        └──── tee bodies ─────┴──── LogPipeline ◀───┘
//!                                       │
//!                       timestamp → service/env → context
//!                       → error normalization → redaction
//!                       → json | pretty → stdout
//! ```
//!
//! Inspection is a side channel: bodies are teed, never re-routed, and
//! transport errors are logged then re-raised unchanged.

pub mod config;
pub mod context;
pub mod error;
pub mod inspect;
pub mod logging;
pub mod redact;

pub use config::{load_config, InspectionConfig, ObservabilityConfig};
pub use context::Context;
pub use error::{InstallError, NoActiveContext};
pub use inspect::{InboundInspectorLayer, InspectedClient, Inspection, CORRELATION_HEADER};
pub use logging::{Level, LogPipeline};
pub use redact::Obfuscator;
