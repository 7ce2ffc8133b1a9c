//! Log sinks.

use std::io::Write;
use std::sync::{Arc, Mutex};

/// Destination for rendered log lines. One line per record.
pub trait LogSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Writes each record as one line to standard output.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write_line(&self, line: &str) {
        // Locking stdout keeps each record on its own line even when many
        // requests log concurrently.
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        let _ = writeln!(handle, "{line}");
    }
}

/// Captures rendered lines in memory. Intended for tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("sink lines poisoned").clone()
    }

    /// Parse every captured line as JSON. Panics on non-JSON lines, which
    /// only happens when the pipeline is misconfigured in a test.
    pub fn records(&self) -> Vec<serde_json::Value> {
        self.lines()
            .iter()
            .map(|line| serde_json::from_str(line).expect("sink line is not JSON"))
            .collect()
    }

    pub fn clear(&self) {
        self.lines.lock().expect("sink lines poisoned").clear();
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, line: &str) {
        self.lines
            .lock()
            .expect("sink lines poisoned")
            .push(line.to_string());
    }
}
