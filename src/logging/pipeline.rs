//! The enrichment pipeline.
//!
//! Stage order per record: timestamp → service/env → context → error
//! normalization → redaction → render. Stages operate on the record under
//! construction; the caller's payload is never mutated.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::config::schema::{LogFormat, LoggerConfig, ServiceConfig};
use crate::context::{Context, ContextSnapshot, LOG_TAGS_KEY};
use crate::error::ObfuscationError;
use crate::logging::record::{Level, LoggedError};
use crate::logging::sink::{LogSink, StdoutSink};
use crate::redact::{Obfuscator, SensitiveKey};

/// One raw log call, before enrichment.
#[derive(Debug, Default)]
pub struct LogEvent {
    pub level: Level,
    pub message: String,
    pub payload: Map<String, Value>,
    pub error: Option<LoggedError>,
    /// Explicit context attribution, for emitters running outside the
    /// originating scope (e.g. response-body completion hooks).
    pub context: Option<ContextSnapshot>,
}

impl LogEvent {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_error(mut self, error: LoggedError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_context(mut self, snapshot: ContextSnapshot) -> Self {
        self.context = Some(snapshot);
        self
    }
}

/// Ordered enrichment chain ending in a single sink.
///
/// Built once at startup from immutable configuration; cheap to share via
/// `Arc` across the inspectors.
pub struct LogPipeline {
    service: String,
    env: String,
    format: LogFormat,
    level: Level,
    silent: bool,
    obfuscator: Obfuscator,
    sink: Arc<dyn LogSink>,
}

impl LogPipeline {
    /// Pipeline writing to stdout.
    pub fn new(service: &ServiceConfig, logger: &LoggerConfig) -> Result<Self, ObfuscationError> {
        Self::with_sink(service, logger, Arc::new(StdoutSink))
    }

    /// Pipeline writing to an explicit sink.
    pub fn with_sink(
        service: &ServiceConfig,
        logger: &LoggerConfig,
        sink: Arc<dyn LogSink>,
    ) -> Result<Self, ObfuscationError> {
        let extra_keys: Vec<SensitiveKey> = logger
            .obfuscation
            .sensitive_keys
            .iter()
            .map(|key| SensitiveKey::parse(key))
            .collect();
        Ok(Self {
            service: service.name.clone(),
            env: service.environment.clone(),
            format: logger.format,
            level: logger.level,
            silent: logger.silent,
            obfuscator: Obfuscator::new(&extra_keys)?,
            sink,
        })
    }

    pub fn emit(&self, event: LogEvent) {
        if self.silent || event.level < self.level {
            return;
        }

        let mut record = Map::new();
        record.insert(
            "timestamp".into(),
            json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        record.insert("level".into(), json!(event.level.as_str()));
        record.insert("message".into(), json!(event.message));
        record.insert("service".into(), json!(self.service));
        record.insert("env".into(), json!(self.env));

        // Context attribution: an error's captured snapshot wins over the
        // emitter-provided one, which wins over the ambient context.
        let snapshot = event
            .error
            .as_ref()
            .and_then(|error| error.context.clone())
            .or(event.context)
            .or_else(|| Context::try_current().ok().map(|ctx| ctx.snapshot()));
        if let Some(snapshot) = snapshot {
            record.insert("contextId".into(), json!(snapshot.context_id));
            if let Some(correlation_id) = snapshot.correlation_id {
                record.insert("correlationId".into(), json!(correlation_id));
            }
        }

        if let Ok(ctx) = Context::try_current() {
            if let Some(tags) = ctx.get(LOG_TAGS_KEY) {
                record.insert("tags".into(), tags);
            }
        }

        for (key, value) in event.payload {
            record.insert(key, value);
        }

        if let Some(error) = &event.error {
            record.insert("error".into(), error.to_value());
        }

        let masked = match self.obfuscator.mask_fields(&Value::Object(record)) {
            Value::Object(map) => map,
            _ => unreachable!("masking an object yields an object"),
        };

        let line = match self.format {
            LogFormat::Json => serde_json::to_string(&Value::Object(masked)).unwrap_or_else(|err| {
                // Losing observability on the failure path is worse than a
                // degraded record: fall back to the bare message.
                tracing::warn!(error = %err, "log record serialization failed");
                format!("{{\"level\":\"{}\",\"message\":{:?}}}", event.level.as_str(), event.message)
            }),
            LogFormat::Pretty => render_pretty(&masked),
        };
        self.sink.write_line(&line);
    }

    pub fn log(&self, level: Level, message: impl Into<String>, payload: Map<String, Value>) {
        self.emit(LogEvent::new(level, message).with_payload(payload));
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.emit(LogEvent::new(Level::Debug, message));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(LogEvent::new(Level::Info, message));
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(LogEvent::new(Level::Warn, message));
    }

    pub fn error(&self, message: impl Into<String>, error: LoggedError) {
        self.emit(LogEvent::new(Level::Error, message).with_error(error));
    }

    /// Log a caught exception. Server-class failures (no response, or a
    /// 5xx one) are errors; anything the caller already handled into a
    /// sub-500 response is debug noise.
    pub fn exception(&self, error: LoggedError) {
        let level = match &error.response {
            Some(response) if response.status < 500 => Level::Debug,
            _ => Level::Error,
        };
        self.emit(LogEvent::new(level, error.message.clone()).with_error(error));
    }
}

/// Keys rendered inline by the pretty format; everything else trails as
/// compact JSON.
const PRETTY_INLINE_KEYS: &[&str] = &["timestamp", "level", "message", "service", "env", "contextId", "correlationId"];

fn render_pretty(record: &Map<String, Value>) -> String {
    let text = |key: &str| record.get(key).and_then(Value::as_str).unwrap_or("-");
    let mut line = format!(
        "{} {:>7} [{}] {}",
        text("timestamp"),
        text("level").to_uppercase(),
        text("service"),
        text("message"),
    );
    if let Some(correlation_id) = record.get("correlationId").and_then(Value::as_str) {
        line.push_str(&format!(" correlationId={correlation_id}"));
    }
    let rest: Map<String, Value> = record
        .iter()
        .filter(|(key, _)| !PRETTY_INLINE_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    if !rest.is_empty() {
        if let Ok(tail) = serde_json::to_string(&rest) {
            line.push(' ');
            line.push_str(&tail);
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{LoggerConfig, ServiceConfig};
    use crate::logging::sink::MemorySink;

    fn pipeline(sink: MemorySink) -> LogPipeline {
        let service = ServiceConfig {
            name: "orders".into(),
            environment: "test".into(),
        };
        LogPipeline::with_sink(&service, &LoggerConfig::default(), Arc::new(sink)).unwrap()
    }

    #[test]
    fn json_records_carry_static_metadata() {
        let sink = MemorySink::new();
        pipeline(sink.clone()).info("hello");
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["message"], "hello");
        assert_eq!(records[0]["service"], "orders");
        assert_eq!(records[0]["env"], "test");
        assert_eq!(records[0]["level"], "info");
        assert!(records[0]["timestamp"].is_string());
    }

    #[test]
    fn records_below_threshold_are_dropped() {
        let sink = MemorySink::new();
        let service = ServiceConfig::default();
        let logger = LoggerConfig {
            level: Level::Warn,
            ..LoggerConfig::default()
        };
        let pipeline =
            LogPipeline::with_sink(&service, &logger, Arc::new(sink.clone())).unwrap();
        pipeline.info("dropped");
        pipeline.warn("kept");
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["message"], "kept");
    }

    #[test]
    fn silent_drops_everything() {
        let sink = MemorySink::new();
        let logger = LoggerConfig {
            silent: true,
            ..LoggerConfig::default()
        };
        let pipeline =
            LogPipeline::with_sink(&ServiceConfig::default(), &logger, Arc::new(sink.clone()))
                .unwrap();
        pipeline.error("nope", LoggedError::new("boom"));
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn payload_is_redacted_before_rendering() {
        let sink = MemorySink::new();
        let mut payload = Map::new();
        payload.insert("request".into(), json!({ "headers": { "authorization": "Bearer x" } }));
        pipeline(sink.clone()).log(Level::Info, "req", payload);
        let records = sink.records();
        assert_eq!(records[0]["request"]["headers"]["authorization"], "*****");
    }

    #[tokio::test]
    async fn ambient_context_is_attached() {
        let sink = MemorySink::new();
        let pipeline = pipeline(sink.clone());
        let ctx = Context::with_correlation_id("corr-42");
        let id = ctx.id().to_string();
        ctx.scope(async move { pipeline.info("in scope") }).await;
        let records = sink.records();
        assert_eq!(records[0]["contextId"], id.as_str());
        assert_eq!(records[0]["correlationId"], "corr-42");
    }

    #[test]
    fn error_snapshot_overrides_ambient_context() {
        let sink = MemorySink::new();
        let snapshot = crate::context::Context::with_correlation_id("from-error").snapshot();
        let error = LoggedError::new("boom").with_context(snapshot.clone());
        pipeline(sink.clone()).error("failed", error);
        let records = sink.records();
        assert_eq!(records[0]["correlationId"], "from-error");
        assert_eq!(records[0]["contextId"], snapshot.context_id.as_str());
        assert_eq!(records[0]["error"]["message"], "boom");
    }

    #[test]
    fn pretty_format_renders_one_line() {
        let sink = MemorySink::new();
        let logger = LoggerConfig {
            format: LogFormat::Pretty,
            ..LoggerConfig::default()
        };
        let pipeline =
            LogPipeline::with_sink(&ServiceConfig::default(), &logger, Arc::new(sink.clone()))
                .unwrap();
        pipeline.log(Level::Warn, "slow response", {
            let mut payload = Map::new();
            payload.insert("duration".into(), json!("1203ms"));
            payload
        });
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("WARN"));
        assert!(lines[0].contains("slow response"));
        assert!(lines[0].contains("1203ms"));
        assert!(!lines[0].contains('\n'));
    }

    #[test]
    fn exceptions_with_handled_responses_log_at_debug() {
        let sink = MemorySink::new();
        let service = ServiceConfig::default();
        let logger = LoggerConfig {
            level: Level::Debug,
            ..LoggerConfig::default()
        };
        let pipeline =
            LogPipeline::with_sink(&service, &logger, Arc::new(sink.clone())).unwrap();
        pipeline.exception(
            LoggedError::new("not found").with_response(404, json!({ "detail": "missing" })),
        );
        pipeline.exception(
            LoggedError::new("upstream exploded").with_response(502, json!(null)),
        );
        pipeline.exception(LoggedError::new("no response at all"));
        let records = sink.records();
        assert_eq!(records[0]["level"], "debug");
        assert_eq!(records[1]["level"], "error");
        assert_eq!(records[2]["level"], "error");
        assert_eq!(records[0]["error"]["response"]["status"], 404);
    }

    #[tokio::test]
    async fn request_scoped_tags_are_folded_in() {
        let sink = MemorySink::new();
        let pipeline = pipeline(sink.clone());
        let ctx = Context::new();
        ctx.set(LOG_TAGS_KEY, json!({ "feature": "checkout" }));
        ctx.scope(async move { pipeline.info("tagged") }).await;
        assert_eq!(sink.records()[0]["tags"]["feature"], "checkout");
    }
}
