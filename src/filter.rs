//! Exclude-pattern filtering for tree listings.
//!
//! Patterns are ordered glob expressions matched against root-relative
//! paths. A leading `!` negates: a path is excluded if it matches a
//! non-negated pattern and is not re-included by a later negated pattern.
//! Only file entries are filtered; directories always admit recursion so
//! later patterns can still match their contents.

use globset::{GlobBuilder, GlobMatcher};

use crate::utils::{Result, SyncError};

/// One compiled pattern: negated means "re-include on match".
struct Rule {
    negated: bool,
    matcher: GlobMatcher,
}

/// A compiled, ordered list of exclude rules.
pub struct ExcludeFilter {
    rules: Vec<Rule>,
}

impl ExcludeFilter {
    /// Compile an ordered pattern list. Fails on malformed globs.
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut rules = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            let (negated, glob) = match pattern.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, pattern.as_str()),
            };

            // `*` matches across `/`, fnmatch-style.
            let matcher = GlobBuilder::new(glob)
                .literal_separator(false)
                .build()
                .map_err(|e| SyncError::Pattern(format!("{}: {}", pattern, e)))?
                .compile_matcher();

            rules.push(Rule { negated, matcher });
        }

        Ok(Self { rules })
    }

    /// An empty filter that excludes nothing.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Whether a root-relative file path should be excluded from an inventory.
    pub fn is_excluded(&self, path: &str) -> bool {
        let mut excluded = false;

        for rule in &self.rules {
            if rule.matcher.is_match(path) {
                excluded = !rule.negated;
            }
        }

        excluded
    }
}
