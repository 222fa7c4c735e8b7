//! Name patterns for ignore lists and `find` include/exclude filters.
//!
//! Patterns use gitignore glob syntax and are matched against a single
//! entry name (`.*`, `__pycache__`, `*.py`), never a full path.

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// Default ignore list: dotfiles and interpreter cache directories.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[".*", "__pycache__"];

/// A compiled set of name patterns.
#[derive(Clone)]
pub struct PatternSet {
    patterns: Vec<String>,
    matcher: Gitignore,
}

impl std::fmt::Debug for PatternSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternSet")
            .field("patterns", &self.patterns)
            .finish()
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl PatternSet {
    /// Compile `patterns`. Patterns that fail to parse are dropped with a warning.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut builder = GitignoreBuilder::new("");
        let mut kept = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            match builder.add_line(None, pattern) {
                Ok(_) => kept.push(pattern.to_string()),
                Err(e) => tracing::warn!(pattern, error = %e, "ignoring invalid name pattern"),
            }
        }
        let matcher = builder.build().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to compile name patterns");
            Gitignore::empty()
        });
        Self {
            patterns: kept,
            matcher,
        }
    }

    /// A set that matches nothing.
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            matcher: Gitignore::empty(),
        }
    }

    /// The default ignore list.
    pub fn default_ignore() -> Self {
        Self::new(DEFAULT_IGNORE_PATTERNS)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Source patterns, in the order given.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// True if `name` matches any pattern.
    pub fn matches(&self, name: &str, is_dir: bool) -> bool {
        if self.patterns.is_empty() || name.is_empty() {
            return false;
        }
        self.matcher
            .matched(Path::new(name), is_dir)
            .is_ignore()
    }
}
