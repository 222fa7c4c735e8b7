//! Lazy recursive traversal for `RootFs::find`.

use std::collections::VecDeque;

use super::handle::FsPath;
use super::path::VirtualPath;
use super::pattern::PatternSet;
use super::root::RootFs;

/// Filters for a walk.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// When non-empty, only files matching one of these are yielded.
    pub include: PatternSet,
    /// Matching directories are pruned; matching files are skipped.
    pub exclude: PatternSet,
    /// Deepest level to visit. Children of the start directory are depth 1.
    pub max_depth: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include<S: AsRef<str>>(mut self, patterns: &[S]) -> Self {
        self.include = PatternSet::new(patterns);
        self
    }

    pub fn exclude<S: AsRef<str>>(mut self, patterns: &[S]) -> Self {
        self.exclude = PatternSet::new(patterns);
        self
    }

    pub fn exclude_set(mut self, patterns: PatternSet) -> Self {
        self.exclude = patterns;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }
}

/// Depth-first walk yielding files in sorted order.
///
/// Directories are listed one at a time as the caller pulls results.
/// Listing failures are logged and the subtree is skipped.
pub struct Walker<'a> {
    root: &'a RootFs,
    options: FindOptions,
    dirs: Vec<(VirtualPath, usize)>,
    ready: VecDeque<FsPath<'a>>,
}

impl<'a> Walker<'a> {
    pub(crate) fn new(root: &'a RootFs, start: VirtualPath, options: FindOptions) -> Self {
        Self {
            root,
            options,
            dirs: vec![(start, 0)],
            ready: VecDeque::new(),
        }
    }

    /// Next matching file, or `None` when the walk is done.
    pub async fn next(&mut self) -> Option<FsPath<'a>> {
        loop {
            if let Some(found) = self.ready.pop_front() {
                return Some(found);
            }
            let (dir, depth) = self.dirs.pop()?;
            self.expand(&dir, depth).await;
        }
    }

    /// Drain the walk into a vector.
    pub async fn collect(mut self) -> Vec<FsPath<'a>> {
        let mut out = Vec::new();
        while let Some(path) = self.next().await {
            out.push(path);
        }
        out
    }

    async fn expand(&mut self, dir: &VirtualPath, depth: usize) {
        let entries = match self.root.list_children(dir, true).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(%dir, error = %e, "skipping unreadable directory");
                Vec::new()
            }
        };

        let child_depth = depth + 1;
        if self.options.max_depth.is_some_and(|max| child_depth > max) {
            return;
        }

        let mut subdirs = Vec::new();
        for entry in entries {
            let is_dir = entry.kind.is_dir();
            if self.options.exclude.matches(&entry.name, is_dir) {
                continue;
            }
            let path = dir.join(&entry.name);
            if is_dir {
                subdirs.push(path);
            } else if self.options.include.is_empty()
                || self.options.include.matches(&entry.name, false)
            {
                self.ready.push_back(FsPath::from_virtual(self.root, path));
            }
        }
        // Listings hide mount points; the walk still descends into them.
        for prefix in self.root.mounts_below(dir) {
            if !self.options.exclude.matches(prefix.name(), true) {
                subdirs.push(prefix);
            }
        }
        subdirs.sort();
        // Stack order: first subdirectory is expanded first.
        self.dirs
            .extend(subdirs.into_iter().rev().map(|path| (path, child_depth)));
    }
}
