//! Backend operations trait.
//!
//! Every storage provider (local disk, memory, anything registered at
//! runtime) implements [`VfsOps`]. `RootFs` only ever talks to this trait.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::VfsResult;
use super::types::{DirEntry, FileAttr};

/// Core backend operations.
///
/// Paths are always relative to the backend's root; `RootFs` handles routing
/// and path translation. The empty path is the backend root.
#[async_trait]
pub trait VfsOps: Send + Sync {
    // ========================================================================
    // Reading
    // ========================================================================

    /// Get file attributes.
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr>;

    /// Read directory entries, sorted by name.
    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>>;

    /// Read up to `size` bytes starting at `offset`.
    ///
    /// Returns fewer bytes at EOF and an empty vector past it.
    async fn read(&self, path: &Path, offset: u64, size: u32) -> VfsResult<Vec<u8>>;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Write `data` at `offset`. Returns the number of bytes written.
    async fn write(&self, path: &Path, offset: u64, data: &[u8]) -> VfsResult<u32>;

    /// Create a new, empty file. Missing parents are created.
    async fn create(&self, path: &Path, mode: u32) -> VfsResult<FileAttr>;

    /// Create a directory and any missing parents.
    ///
    /// Succeeds if the directory already exists.
    async fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<FileAttr>;

    /// Remove a file.
    async fn unlink(&self, path: &Path) -> VfsResult<()>;

    /// Remove an empty directory.
    async fn rmdir(&self, path: &Path) -> VfsResult<()>;

    /// Rename a file or directory inside this backend.
    async fn rename(&self, from: &Path, to: &Path) -> VfsResult<()>;

    /// Truncate a file to the specified size.
    async fn truncate(&self, path: &Path, size: u64) -> VfsResult<()>;

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Returns true if this filesystem is read-only.
    fn read_only(&self) -> bool;

    /// Short backend label for logs (`local`, `memory`, ...).
    fn label(&self) -> &'static str;

    /// Native filesystem path for `path`, when the backend has one.
    ///
    /// Used for zero-copy downloads and for running git in the root mount.
    async fn real_path(&self, path: &Path) -> VfsResult<Option<PathBuf>> {
        let _ = path;
        Ok(None)
    }

    // ========================================================================
    // Convenience methods
    // ========================================================================

    /// Check if a path exists.
    async fn exists(&self, path: &Path) -> bool {
        self.getattr(path).await.is_ok()
    }

    /// Read entire file contents.
    async fn read_all(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let attr = self.getattr(path).await?;
        let size = u32::try_from(attr.size).unwrap_or(u32::MAX);
        self.read(path, 0, size).await
    }

    /// Replace the whole file with `data`, creating it if needed.
    async fn write_all(&self, path: &Path, data: &[u8]) -> VfsResult<()> {
        if self.exists(path).await {
            self.truncate(path, 0).await?;
        } else {
            self.create(path, 0o644).await?;
        }
        self.write(path, 0, data).await?;
        Ok(())
    }
}
