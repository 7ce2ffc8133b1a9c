//! Sensitive-field redaction for log payloads.

mod obfuscator;

pub use obfuscator::{Obfuscator, SensitiveKey, MASK};
