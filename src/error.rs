//! Crate-level error types.

use thiserror::Error;

/// Returned by [`crate::context::Context::try_current`] when no logical
/// request scope is active on the calling task.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("no active context: called outside a logical request scope")]
pub struct NoActiveContext;

/// Installation-time misconfiguration of the traffic inspection layer.
#[derive(Debug, Error)]
pub enum InstallError {
    /// Traffic inspection was already wired into this process. Re-wrapping
    /// the client entry points would double every captured record, so a
    /// second install is rejected instead of silently applied.
    #[error("traffic inspection is already installed in this process")]
    AlreadyInstalled,

    /// A route glob did not compile to a valid pattern.
    #[error("invalid route pattern `{pattern}`: {source}")]
    InvalidRoutePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A sensitive-key pattern handed to the obfuscator did not compile.
#[derive(Debug, Error)]
#[error("invalid sensitive-key pattern `{pattern}`: {source}")]
pub struct ObfuscationError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}
