//! Route glob matching for inspection filtering.
//!
//! # Responsibilities
//! - Compile `*`-glob strings into anchored, case-insensitive patterns
//! - Match request paths for the inbound deny-list and outbound allow-list
//!
//! # Design Decisions
//! - `*` is the only metacharacter and is greedy; everything else in the
//!   glob is escaped, so route strings never inject regex syntax
//! - Patterns compile once at installation; a bad glob is a configuration
//!   error, not a runtime one

use regex::{Regex, RegexBuilder};

use crate::error::InstallError;

/// An ordered set of compiled route globs.
#[derive(Debug, Clone, Default)]
pub struct RouteMatcher {
    patterns: Vec<Regex>,
}

impl RouteMatcher {
    /// Compile the given globs. An empty list yields a matcher that
    /// matches nothing.
    pub fn compile(globs: &[String]) -> Result<Self, InstallError> {
        let mut patterns = Vec::with_capacity(globs.len());
        for glob in globs {
            let source = glob_to_regex(glob);
            let pattern = RegexBuilder::new(&source)
                .case_insensitive(true)
                .build()
                .map_err(|source| InstallError::InvalidRoutePattern {
                    pattern: glob.clone(),
                    source,
                })?;
            patterns.push(pattern);
        }
        Ok(Self { patterns })
    }

    /// True if `path` matches any compiled glob.
    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(path))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Translate a glob into an anchored regex source: `*` becomes `.*`,
/// everything else is matched literally.
fn glob_to_regex(glob: &str) -> String {
    let mut source = String::with_capacity(glob.len() + 8);
    source.push('^');
    for (i, part) in glob.split('*').enumerate() {
        if i > 0 {
            source.push_str(".*");
        }
        source.push_str(&regex::escape(part));
    }
    source.push('$');
    source
}
