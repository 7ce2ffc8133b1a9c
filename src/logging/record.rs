//! Log levels and error normalization.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::context::ContextSnapshot;

/// Severity of a record, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Verbose,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Verbose => "verbose",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

/// Severity the traffic inspectors use for a given response status.
pub fn level_for_status(status: u16) -> Level {
    if status >= 500 {
        Level::Error
    } else if status >= 400 {
        Level::Warn
    } else {
        Level::Info
    }
}

/// An error normalized for logging: message, optional cause chain, an
/// optional response the failing call produced, and the context snapshot
/// captured where the error was raised.
#[derive(Debug, Clone, Default)]
pub struct LoggedError {
    pub message: String,
    pub stack: Option<String>,
    pub response: Option<ErrorResponse>,
    pub context: Option<ContextSnapshot>,
}

/// Response attached to an error raised by a failed HTTP exchange.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    pub status: u16,
    pub data: Value,
}

impl LoggedError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Normalize a std error, folding its source chain into `stack`.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut stack = Vec::new();
        let mut cause = error.source();
        while let Some(current) = cause {
            stack.push(format!("caused by: {current}"));
            cause = current.source();
        }
        Self {
            message: error.to_string(),
            stack: if stack.is_empty() {
                None
            } else {
                Some(stack.join("\n"))
            },
            response: None,
            context: None,
        }
    }

    pub fn with_response(mut self, status: u16, data: Value) -> Self {
        self.response = Some(ErrorResponse { status, data });
        self
    }

    pub fn with_context(mut self, snapshot: ContextSnapshot) -> Self {
        self.context = Some(snapshot);
        self
    }

    /// The `error` sub-object of the emitted record.
    pub(crate) fn to_value(&self) -> Value {
        let mut error = json!({ "message": self.message });
        if let Some(stack) = &self.stack {
            error["stack"] = json!(stack);
        }
        if let Some(response) = &self.response {
            error["response"] = json!({ "status": response.status, "data": response.data });
        }
        error
    }
}
