//! Virtual path normalization.
//!
//! User-supplied paths are slash separated and may contain `.`, `..` and
//! repeated slashes. [`normalize`] turns them into a canonical relative form
//! and [`VirtualPath`] wraps that form as an absolute path in the unified
//! namespace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonicalize a slash-separated path.
///
/// Empty and `.` segments are dropped; `..` pops the previous segment and is
/// discarded when there is nothing left to pop, so a path can never climb
/// above the root. The result has no leading or trailing slash; the root is
/// the empty string.
pub fn normalize<'a>(path: impl Into<Option<&'a str>>) -> String {
    let path = path.into().unwrap_or("/");
    let mut result: Vec<&str> = Vec::new();
    for comp in path.split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                result.pop();
            }
            _ => result.push(comp),
        }
    }
    result.join("/")
}

/// Split a path into `(head, tail)` at the last slash.
///
/// Trailing slashes are ignored; a path without a directory part has
/// `"/"` as its head.
pub fn split(pathname: &str) -> (&str, &str) {
    let pathname = pathname.trim_end_matches('/');
    match pathname.rfind('/') {
        None => ("/", pathname),
        Some(0) => ("/", &pathname[1..]),
        Some(i) => (&pathname[..i], &pathname[i + 1..]),
    }
}

/// A normalized absolute path in the virtual namespace.
///
/// Stored without the leading slash; displayed with it. Equality and
/// ordering are plain string comparisons of the normalized form.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct VirtualPath(String);

impl VirtualPath {
    /// Normalize `path` into a virtual path.
    pub fn new(path: &str) -> Self {
        Self(normalize(path))
    }

    /// The root path `/`.
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Normalized form without the leading slash (`""` for the root).
    pub fn as_relative(&self) -> &str {
        &self.0
    }

    /// Final path segment (`""` for the root).
    pub fn name(&self) -> &str {
        split(&self.0).1
    }

    /// Containing directory. The root is its own parent.
    pub fn parent(&self) -> VirtualPath {
        VirtualPath::new(split(&self.0).0)
    }

    /// Append `child` (which may itself contain slashes or `..`).
    pub fn join(&self, child: &str) -> VirtualPath {
        VirtualPath::new(&format!("{}/{}", self.0, child))
    }

    /// Path segments from the root down.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Number of segments below the root.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Segment-aware prefix test: `/a/b` starts with `/a` but not with `/a/b2`.
    pub fn starts_with(&self, prefix: &VirtualPath) -> bool {
        self.strip_prefix(prefix).is_some()
    }

    /// The remainder of `self` below `prefix`, without a leading slash.
    pub fn strip_prefix(&self, prefix: &VirtualPath) -> Option<&str> {
        if prefix.is_root() {
            return Some(&self.0);
        }
        let rest = self.0.strip_prefix(prefix.0.as_str())?;
        if rest.is_empty() {
            Some(rest)
        } else {
            rest.strip_prefix('/')
        }
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl AsRef<str> for VirtualPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VirtualPath {
    fn from(s: &str) -> Self {
        VirtualPath::new(s)
    }
}

impl From<String> for VirtualPath {
    fn from(s: String) -> Self {
        VirtualPath::new(&s)
    }
}

impl From<VirtualPath> for String {
    fn from(p: VirtualPath) -> Self {
        p.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_to_root() {
        for p in ["/", "/../", "../", "../../", "../..", "/..", "//", "////../", "..///", "..///../", "..///..", "//.."] {
            assert_eq!(normalize(p), "", "input {p:?}");
        }
        assert_eq!(normalize(None::<&str>), "");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn normalize_strips_leading_parents() {
        assert_eq!(normalize("/aaa"), "aaa");
        assert_eq!(normalize("/../aaa"), "aaa");
        assert_eq!(normalize("../aaa"), "aaa");
        assert_eq!(normalize("../../aaa"), "aaa");
        assert_eq!(normalize("aaa"), "aaa");
    }

    #[test]
    fn normalize_resolves_inner_segments() {
        assert_eq!(normalize("/a/./b/../c/"), "a/c");
        assert_eq!(normalize("a//b///c"), "a/b/c");
        assert_eq!(normalize("/~logs/x/../y.txt"), "~logs/y.txt");
    }

    #[test]
    fn normalize_is_idempotent() {
        for p in ["/", "../../aaa", "a/./b/../../c", "//x//y/", "~m/../..", "a/b/c/../../.."] {
            let once = normalize(p);
            assert_eq!(normalize(once.as_str()), once, "input {p:?}");
        }
    }

    #[test]
    fn test_split() {
        assert_eq!(split("/aaa/bb/c"), ("/aaa/bb", "c"));
        assert_eq!(split("/aaa/bb/"), ("/aaa", "bb"));
        assert_eq!(split("/"), ("/", ""));
        assert_eq!(split("ciccio"), ("/", "ciccio"));
        assert_eq!(split(""), ("/", ""));
        assert_eq!(split("/aaa"), ("/", "aaa"));
    }

    #[test]
    fn virtual_path_parent_and_name() {
        let p = VirtualPath::new("/aaa/bbb/ccc");
        assert_eq!(p.name(), "ccc");
        assert_eq!(p.parent(), VirtualPath::new("/aaa/bbb"));
        assert_eq!(p.to_string(), "/aaa/bbb/ccc");

        let top = VirtualPath::new("aaa");
        assert_eq!(top.parent(), VirtualPath::root());
        assert_eq!(VirtualPath::root().parent(), VirtualPath::root());
        assert_eq!(VirtualPath::root().to_string(), "/");
    }

    #[test]
    fn virtual_path_prefixes_are_segment_aware() {
        let mount = VirtualPath::new("/~logs");
        assert!(VirtualPath::new("/~logs/x.txt").starts_with(&mount));
        assert!(VirtualPath::new("/~logs").starts_with(&mount));
        assert!(!VirtualPath::new("/~logs2/x.txt").starts_with(&mount));
        assert_eq!(VirtualPath::new("/~logs/a/b").strip_prefix(&mount), Some("a/b"));
        assert_eq!(VirtualPath::new("/~logs").strip_prefix(&mount), Some(""));
        assert!(VirtualPath::new("/anything").starts_with(&VirtualPath::root()));
    }

    #[test]
    fn virtual_path_join_normalizes() {
        let base = VirtualPath::new("/a/b");
        assert_eq!(base.join("c"), VirtualPath::new("/a/b/c"));
        assert_eq!(base.join("../c"), VirtualPath::new("/a/c"));
        assert_eq!(VirtualPath::root().join("x"), VirtualPath::new("x"));
    }
}
