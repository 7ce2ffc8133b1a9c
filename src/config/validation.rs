//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Compile every route glob and sensitive-key pattern up front
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: ObservabilityConfig → Result<(), Vec<ValidationError>>
//! - Runs before the layer is installed

use thiserror::Error;

use crate::config::schema::ObservabilityConfig;
use crate::inspect::routes::RouteMatcher;
use crate::redact::{Obfuscator, SensitiveKey};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("inspection.ignore_routes: {0}")]
    IgnoreRoute(crate::error::InstallError),

    #[error("inspection.allowed_outbound_routes: {0}")]
    AllowedRoute(crate::error::InstallError),

    #[error("logger.obfuscation.sensitive_keys: {0}")]
    SensitiveKey(crate::error::ObfuscationError),
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &ObservabilityConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(err) = RouteMatcher::compile(&config.inspection.ignore_routes) {
        errors.push(ValidationError::IgnoreRoute(err));
    }
    if let Err(err) = RouteMatcher::compile(&config.inspection.allowed_outbound_routes) {
        errors.push(ValidationError::AllowedRoute(err));
    }

    let keys: Vec<SensitiveKey> = config
        .logger
        .obfuscation
        .sensitive_keys
        .iter()
        .map(|key| SensitiveKey::parse(key))
        .collect();
    if let Err(err) = Obfuscator::new(&keys) {
        errors.push(ValidationError::SensitiveKey(err));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
