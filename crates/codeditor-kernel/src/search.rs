//! Content search across the virtual namespace.
//!
//! Walks files with [`RootFs::find`], skips anything that does not look like
//! text, and reports matching lines, optionally grouped into context windows.

use std::borrow::Cow;

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use thiserror::Error;

use crate::vfs::{FindOptions, PatternSet, RootFs, VirtualPath};

/// Bytes inspected when deciding whether a file is binary.
const BINARY_SNIFF_LEN: usize = 8192;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// One matching line, or one merged block of context around matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    pub path: VirtualPath,
    /// 1-based row of the (last) match.
    pub row_number: usize,
    /// 1-based row where `context_text` starts.
    pub context_first_row: usize,
    pub context_text: String,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Lines before and after each match. 0 reports bare lines.
    pub context_lines: usize,
    /// Directory to search from.
    pub start: VirtualPath,
    /// Only search files whose names match one of these.
    pub include: Vec<String>,
    /// Names to prune. `None` uses the filesystem's ignore list.
    pub exclude: Option<Vec<String>>,
    pub max_depth: Option<usize>,
    /// Treat the query as a regular expression instead of a literal.
    pub regex: bool,
    pub ignore_case: bool,
    /// Stop after this many results. 0 means no limit.
    pub max_results: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            context_lines: 0,
            start: VirtualPath::root(),
            include: Vec::new(),
            exclude: None,
            max_depth: None,
            regex: false,
            ignore_case: false,
            max_results: 1000,
        }
    }
}

impl SearchOptions {
    pub fn with_context(mut self, lines: usize) -> Self {
        self.context_lines = lines;
        self
    }
}

fn build_matcher(query: &str, options: &SearchOptions) -> Result<Regex, SearchError> {
    let pattern = if options.regex {
        query.to_string()
    } else {
        regex::escape(query)
    };
    Ok(RegexBuilder::new(&pattern)
        .case_insensitive(options.ignore_case)
        .build()?)
}

/// `bytes` as text, or `None` if it looks binary.
///
/// Only a NUL byte near the start marks a file as binary. Other encodings
/// are decoded lossily, so a Latin-1 script is still searched.
pub fn as_text(bytes: &[u8]) -> Option<Cow<'_, str>> {
    let head = &bytes[..bytes.len().min(BINARY_SNIFF_LEN)];
    if head.contains(&0) {
        return None;
    }
    Some(String::from_utf8_lossy(bytes))
}

/// Search every text file below `options.start` for `query`.
///
/// Unreadable and binary files are skipped. An empty query matches nothing.
#[tracing::instrument(skip(fs, options), fields(start = %options.start))]
pub async fn search(
    fs: &RootFs,
    query: &str,
    options: &SearchOptions,
) -> Result<Vec<SearchMatch>, SearchError> {
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let matcher = build_matcher(query, options)?;

    let exclude = match &options.exclude {
        Some(patterns) => PatternSet::new(patterns),
        None => fs.ignore_patterns().clone(),
    };
    let mut find = FindOptions::new().include(&options.include).exclude_set(exclude);
    find.max_depth = options.max_depth;

    let limit = match options.max_results {
        0 => usize::MAX,
        n => n,
    };
    let mut results = Vec::new();
    let mut walker = fs.find(&options.start, find);
    while let Some(file) = walker.next().await {
        let bytes = match file.read_bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %file, error = %e, "skipping unreadable file");
                continue;
            }
        };
        let Some(text) = as_text(&bytes) else {
            continue;
        };

        let remaining = limit - results.len();
        results.extend(search_text(
            file.path(),
            &text,
            &matcher,
            options.context_lines,
            remaining,
        ));
        if results.len() >= limit {
            tracing::info!(limit, "search result limit reached");
            break;
        }
    }
    Ok(results)
}

/// Matches within one file's text.
fn search_text(
    path: &VirtualPath,
    text: &str,
    matcher: &Regex,
    context: usize,
    limit: usize,
) -> Vec<SearchMatch> {
    let lines: Vec<&str> = text.lines().collect();
    let hits = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| matcher.is_match(line))
        .map(|(i, _)| i);

    if context == 0 {
        return hits
            .take(limit)
            .map(|i| SearchMatch {
                path: path.clone(),
                row_number: i + 1,
                context_first_row: i + 1,
                context_text: lines[i].to_string(),
            })
            .collect();
    }

    // (first line, last line, last hit), all 0-based and inclusive.
    let mut windows: Vec<(usize, usize, usize)> = Vec::new();
    for hit in hits {
        let start = hit.saturating_sub(context);
        let end = (hit + context).min(lines.len() - 1);
        match windows.last_mut() {
            Some(w) if start <= w.1 + 1 => {
                w.1 = w.1.max(end);
                w.2 = hit;
            }
            _ => windows.push((start, end, hit)),
        }
    }

    windows
        .into_iter()
        .take(limit)
        .map(|(start, end, hit)| {
            let mut context_text = lines[start..=end].join("\n");
            context_text.push('\n');
            SearchMatch {
                path: path.clone(),
                row_number: hit + 1,
                context_first_row: start + 1,
                context_text,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryBackend;
    use std::sync::Arc;

    fn literal(q: &str) -> Regex {
        build_matcher(q, &SearchOptions::default()).unwrap()
    }

    const TEXT: &str = "one\ntwo\nneedle a\nfour\nneedle b\nsix\nseven\neight\nnine\nten\nneedle c\n";

    #[test]
    fn bare_lines_without_context() {
        let path = VirtualPath::new("/f.py");
        let found = search_text(&path, TEXT, &literal("needle"), 0, usize::MAX);
        let rows: Vec<_> = found.iter().map(|m| m.row_number).collect();
        assert_eq!(rows, vec![3, 5, 11]);
        assert!(found.iter().all(|m| m.row_number == m.context_first_row));
        assert_eq!(found[0].context_text, "needle a");
    }

    #[test]
    fn nearby_matches_merge_into_one_window() {
        let path = VirtualPath::new("/f.py");
        let found = search_text(&path, TEXT, &literal("needle"), 2, usize::MAX);
        assert_eq!(found.len(), 2);

        assert_eq!(found[0].context_first_row, 1);
        assert_eq!(found[0].row_number, 5);
        assert_eq!(found[0].context_text, "one\ntwo\nneedle a\nfour\nneedle b\nsix\nseven\n");

        assert_eq!(found[1].context_first_row, 9);
        assert_eq!(found[1].row_number, 11);
        assert_eq!(found[1].context_text, "nine\nten\nneedle c\n");
    }

    #[test]
    fn adjacent_windows_merge() {
        // Windows [1,3] and [4,6] touch and merge.
        let text = "a\nx\nb\nc\nx\nd\n";
        let found = search_text(&VirtualPath::new("/t"), text, &literal("x"), 1, usize::MAX);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].context_first_row, 1);
        assert_eq!(found[0].row_number, 5);
    }

    #[test]
    fn literal_escapes_metacharacters() {
        let text = "a.b\naxb\n";
        let found = search_text(&VirtualPath::new("/t"), text, &literal("a.b"), 0, usize::MAX);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].row_number, 1);
    }

    #[test]
    fn binary_detection() {
        assert_eq!(as_text(b"plain text\n").as_deref(), Some("plain text\n"));
        assert_eq!(as_text(b"a\0b"), None);
        assert_eq!(as_text(b"caf\xe9").as_deref(), Some("caf\u{fffd}"));
        assert_eq!(as_text(b"").as_deref(), Some(""));
    }

    #[tokio::test]
    async fn search_walks_and_skips_binary_and_ignored() {
        let fs = RootFs::new(Arc::new(MemoryBackend::new()));
        fs.write_text("/dags/a.py", "import airflow\nprint('x')\n").await.unwrap();
        fs.write_text("/dags/b.py", "# no imports here\n").await.unwrap();
        fs.write_bytes("/dags/blob.bin", b"import\0binary").await.unwrap();
        fs.write_text("/.hidden/c.py", "import os\n").await.unwrap();
        fs.write_text("/__pycache__/d.py", "import os\n").await.unwrap();
        fs.write_bytes("/dags/latin1.py", b"# caf\xe9\nimport sys\n").await.unwrap();

        let found = search(&fs, "import", &SearchOptions::default()).await.unwrap();
        let paths: Vec<_> = found.iter().map(|m| m.path.to_string()).collect();
        assert_eq!(paths, vec!["/dags/a.py", "/dags/b.py", "/dags/latin1.py"]);
        assert_eq!(found[2].row_number, 2);

        let mut options = SearchOptions::default();
        options.exclude = Some(Vec::new());
        let found = search(&fs, "import os", &options).await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn search_options() {
        let fs = RootFs::new(Arc::new(MemoryBackend::new()));
        fs.write_text("/a.py", "Foo\nfoo\nfoo.bar\n").await.unwrap();

        assert!(search(&fs, "", &SearchOptions::default()).await.unwrap().is_empty());

        let mut options = SearchOptions::default();
        options.ignore_case = true;
        assert_eq!(search(&fs, "FOO", &options).await.unwrap().len(), 3);

        let mut options = SearchOptions::default();
        options.regex = true;
        let found = search(&fs, r"^foo\.", &options).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].row_number, 3);

        assert!(search(&fs, "(", &options).await.is_err());

        let mut options = SearchOptions::default();
        options.max_results = 2;
        assert_eq!(search(&fs, "o", &options).await.unwrap().len(), 2);
    }
}
