//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files,
//! with defaults so a minimal config stays minimal.

use serde::{Deserialize, Serialize};

use crate::logging::Level;

/// Root configuration for the observability layer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Service identity stamped on every record.
    pub service: ServiceConfig,

    /// Logging pipeline settings.
    pub logger: LoggerConfig,

    /// Traffic inspection settings.
    pub inspection: InspectionConfig,
}

/// Service identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name (e.g. "orders-api").
    pub name: String,

    /// Deployment environment (e.g. "production", "staging").
    pub environment: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "app".to_string(),
            environment: "production".to_string(),
        }
    }
}

/// Logging pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LoggerConfig {
    /// Minimum level emitted.
    pub level: Level,

    /// Output rendering.
    pub format: LogFormat,

    /// Drop every record. Useful for tests of surrounding machinery.
    pub silent: bool,

    /// Sensitive-field redaction settings.
    pub obfuscation: ObfuscationConfig,
}

/// Rendering mode for emitted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable single line.
    Pretty,
}

/// Redaction configuration. Keys listed here extend the built-in
/// sensitive set and match field names case-insensitively as substrings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ObfuscationConfig {
    pub sensitive_keys: Vec<String>,
}

/// Traffic inspection configuration. Immutable once installed.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InspectionConfig {
    /// Which directions are inspected.
    pub mode: InspectionMode,

    /// Inbound deny-list: requests whose path matches any glob pass
    /// through untouched with no record and no buffering.
    pub ignore_routes: Vec<String>,

    /// Outbound allow-list: only calls whose path matches a glob are
    /// inspected. Non-matching calls proceed unmodified.
    pub allowed_outbound_routes: Vec<String>,

    /// Inject `x-correlation-id` on outbound calls even when outbound
    /// inspection is off.
    pub propagate_correlation: bool,
}

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            mode: InspectionMode::default(),
            ignore_routes: Vec::new(),
            allowed_outbound_routes: Vec::new(),
            propagate_correlation: true,
        }
    }
}

/// Which traffic directions the inspectors observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InspectionMode {
    None,
    #[default]
    All,
    Inbound,
    Outbound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let config: ObservabilityConfig = toml::from_str("").unwrap();
        assert_eq!(config.service.name, "app");
        assert_eq!(config.logger.format, LogFormat::Json);
        assert_eq!(config.inspection.mode, InspectionMode::All);
        assert!(config.inspection.propagate_correlation);
    }

    #[test]
    fn full_toml_round_trips() {
        let config: ObservabilityConfig = toml::from_str(
            r#"
            [service]
            name = "orders"
            environment = "staging"

            [logger]
            level = "warn"
            format = "pretty"
            silent = false

            [logger.obfuscation]
            sensitive_keys = ["ssn", "document"]

            [inspection]
            mode = "inbound"
            ignore_routes = ["/health*", "/metrics"]
            allowed_outbound_routes = ["/api/*"]
            propagate_correlation = false
            "#,
        )
        .unwrap();
        assert_eq!(config.service.name, "orders");
        assert_eq!(config.logger.level, Level::Warn);
        assert_eq!(config.logger.format, LogFormat::Pretty);
        assert_eq!(config.inspection.mode, InspectionMode::Inbound);
        assert_eq!(config.inspection.ignore_routes.len(), 2);
        assert_eq!(config.logger.obfuscation.sensitive_keys.len(), 2);
        assert!(!config.inspection.propagate_correlation);
    }
}
