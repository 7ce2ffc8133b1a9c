//! Key-pattern redaction over JSON trees.
//!
//! # Responsibilities
//! - Replace the value of every field whose key matches a sensitive pattern
//! - Return a deep copy; never mutate the input
//!
//! # Design Decisions
//! - Patterns compile once at construction; matching at log time is
//!   infallible, so redaction can never abort the request path
//! - Depth is capped: JSON values cannot be cyclic, but degenerate nesting
//!   must not blow the stack

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use crate::error::ObfuscationError;

/// Replacement written over every sensitive value.
pub const MASK: &str = "*****";

/// Nesting deeper than this is replaced with a placeholder instead of
/// being traversed further.
const MAX_DEPTH: usize = 64;

const TRUNCATED: &str = "[truncated]";

/// Field names always considered sensitive, regardless of configuration.
const BUILTIN_PATTERNS: &[&str] = &[
    "authorization",
    "password",
    "access.*token",
    "bearer",
    "client.*secret",
    ".*api.*key",
    "card.*number",
];

/// A caller-supplied sensitive-key matcher.
#[derive(Debug, Clone)]
pub enum SensitiveKey {
    /// Case-insensitive substring match against the field name.
    Literal(String),
    /// Regular expression applied to the field name exactly as given.
    Pattern(String),
}

impl From<&str> for SensitiveKey {
    fn from(s: &str) -> Self {
        SensitiveKey::Literal(s.to_string())
    }
}

impl SensitiveKey {
    /// Interpret a configuration string: slash-delimited keys (`/access.*token/`)
    /// are regex patterns, everything else is a literal.
    pub fn parse(key: &str) -> Self {
        if key.len() >= 2 && key.starts_with('/') && key.ends_with('/') {
            SensitiveKey::Pattern(key[1..key.len() - 1].to_string())
        } else {
            SensitiveKey::Literal(key.to_string())
        }
    }
}

/// Redacts matching field names in arbitrary JSON structures.
#[derive(Debug, Clone)]
pub struct Obfuscator {
    patterns: Vec<Regex>,
}

impl Obfuscator {
    /// Build an obfuscator from the built-in sensitive set plus
    /// caller-supplied extra keys.
    pub fn new(extra_keys: &[SensitiveKey]) -> Result<Self, ObfuscationError> {
        let mut patterns = Vec::with_capacity(BUILTIN_PATTERNS.len() + extra_keys.len());
        for key in extra_keys {
            patterns.push(compile(key)?);
        }
        for builtin in BUILTIN_PATTERNS {
            patterns.push(compile_source(builtin, true).map_err(|source| ObfuscationError {
                pattern: (*builtin).to_string(),
                source,
            })?);
        }
        Ok(Self { patterns })
    }

    /// Deep copy of `value` with every field whose key matches a pattern
    /// replaced by [`MASK`]. Scalars and null pass through unchanged.
    pub fn mask_fields(&self, value: &Value) -> Value {
        self.mask(value, 0)
    }

    fn mask(&self, value: &Value, depth: usize) -> Value {
        if depth > MAX_DEPTH {
            return Value::String(TRUNCATED.to_string());
        }
        match value {
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.mask(item, depth + 1)).collect())
            }
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, nested) in map {
                    if self.is_sensitive(key) {
                        out.insert(key.clone(), Value::String(MASK.to_string()));
                    } else {
                        out.insert(key.clone(), self.mask(nested, depth + 1));
                    }
                }
                Value::Object(out)
            }
            scalar => scalar.clone(),
        }
    }

    fn is_sensitive(&self, key: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(key))
    }
}

fn compile(key: &SensitiveKey) -> Result<Regex, ObfuscationError> {
    // Literals match case-insensitively; explicit patterns are applied
    // exactly as given (embed `(?i)` to opt in).
    let (source, case_insensitive) = match key {
        SensitiveKey::Literal(literal) => (regex::escape(literal), true),
        SensitiveKey::Pattern(pattern) => (pattern.clone(), false),
    };
    compile_source(&source, case_insensitive).map_err(|err| ObfuscationError {
        pattern: match key {
            SensitiveKey::Literal(s) | SensitiveKey::Pattern(s) => s.clone(),
        },
        source: err,
    })
}

fn compile_source(source: &str, case_insensitive: bool) -> Result<Regex, regex::Error> {
    RegexBuilder::new(source)
        .case_insensitive(case_insensitive)
        .build()
}
