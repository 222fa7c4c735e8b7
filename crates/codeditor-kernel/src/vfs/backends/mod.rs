//! VFS backends.
//!
//! Backends implement [`VfsOps`] for different storage types. Mount
//! descriptors name a backend by URI; [`open_backend`] turns that URI into
//! a live backend.

mod local;
mod memory;

use std::sync::Arc;

pub use local::LocalBackend;
pub use memory::MemoryBackend;

use crate::config::ConfigError;
use crate::vfs::VfsOps;

/// Open the backend a mount URI points at.
///
/// Bare paths, `file://` and `osfs://` serve a local directory; `mem://`
/// is a fresh in-memory filesystem. Other schemes are rejected.
pub fn open_backend(uri: &str) -> Result<Arc<dyn VfsOps>, ConfigError> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(ConfigError::InvalidMount("empty backend location".into()));
    }
    match uri.split_once("://") {
        None => Ok(Arc::new(LocalBackend::new(uri))),
        Some(("file" | "osfs", rest)) => {
            if rest.is_empty() {
                return Err(ConfigError::InvalidMount(format!("missing path in {uri}")));
            }
            Ok(Arc::new(LocalBackend::new(rest)))
        }
        Some(("mem", _)) => Ok(Arc::new(MemoryBackend::new())),
        Some((scheme, _)) => Err(ConfigError::UnsupportedBackend(scheme.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schemes_select_backends() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().display().to_string();

        assert_eq!(open_backend(&path).unwrap().label(), "local");
        assert_eq!(open_backend(&format!("file://{path}")).unwrap().label(), "local");
        assert_eq!(open_backend(&format!("osfs://{path}")).unwrap().label(), "local");
        assert_eq!(open_backend("mem://").unwrap().label(), "memory");
    }

    #[test]
    fn unknown_scheme_rejected() {
        let err = open_backend("s3://bucket/prefix").err().unwrap();
        assert!(matches!(err, ConfigError::UnsupportedBackend(ref s) if s == "s3"));
        assert!(open_backend("  ").is_err());
    }
}
