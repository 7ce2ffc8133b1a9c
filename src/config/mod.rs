//! Configuration management.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks: globs, patterns)
//!     → ObservabilityConfig (validated, immutable)
//!     → consumed once at installation
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the layer is installed
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks and
//!   returns every error, not just the first

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    InspectionConfig, InspectionMode, LogFormat, LoggerConfig, ObfuscationConfig,
    ObservabilityConfig, ServiceConfig,
};
