//! VFS error types.
//!
//! Backends report `std::io::Error`; everything crossing the `RootFs`
//! boundary is a [`VfsError`].

use std::io;
use thiserror::Error;

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Mount prefix is a parent or child of an existing mount.
    #[error("mount point overlaps existing mount: {0}")]
    MountOverlap(String),

    /// Operation would need a recursive copy between two backends.
    #[error("operation not supported across backends: {0}")]
    CrossBackendUnsupported(String),

    /// Filesystem is read-only.
    #[error("filesystem is read-only")]
    ReadOnly,

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Directory not empty.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Path escapes the backend root.
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    /// Invalid path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl VfsError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn mount_overlap(path: impl Into<String>) -> Self {
        Self::MountOverlap(path.into())
    }

    pub fn cross_backend(path: impl Into<String>) -> Self {
        Self::CrossBackendUnsupported(path.into())
    }

    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    pub fn path_escapes_root(path: impl Into<String>) -> Self {
        Self::PathEscapesRoot(path.into())
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// True for the "nothing there" family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, VfsError::NotFound(_))
    }

    /// Replace the backend-relative path in the message with `path`.
    ///
    /// `RootFs` uses this so callers see virtual paths only.
    pub fn with_path(self, path: impl Into<String>) -> Self {
        let path = path.into();
        match self {
            VfsError::NotFound(_) => VfsError::NotFound(path),
            VfsError::AlreadyExists(_) => VfsError::AlreadyExists(path),
            VfsError::PermissionDenied(_) => VfsError::PermissionDenied(path),
            VfsError::NotADirectory(_) => VfsError::NotADirectory(path),
            VfsError::IsADirectory(_) => VfsError::IsADirectory(path),
            VfsError::DirectoryNotEmpty(_) => VfsError::DirectoryNotEmpty(path),
            VfsError::PathEscapesRoot(_) => VfsError::PathEscapesRoot(path),
            other => other,
        }
    }

    /// OS error number, when the failure carries one.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            VfsError::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }
}

/// Translate backend I/O errors into the VFS taxonomy.
impl From<io::Error> for VfsError {
    fn from(e: io::Error) -> Self {
        let msg = e.to_string();
        match e.kind() {
            io::ErrorKind::NotFound => VfsError::NotFound(msg),
            io::ErrorKind::AlreadyExists => VfsError::AlreadyExists(msg),
            io::ErrorKind::PermissionDenied => VfsError::PermissionDenied(msg),
            io::ErrorKind::NotADirectory => VfsError::NotADirectory(msg),
            io::ErrorKind::IsADirectory => VfsError::IsADirectory(msg),
            io::ErrorKind::DirectoryNotEmpty => VfsError::DirectoryNotEmpty(msg),
            io::ErrorKind::ReadOnlyFilesystem => VfsError::ReadOnly,
            io::ErrorKind::CrossesDevices => VfsError::CrossBackendUnsupported(msg),
            io::ErrorKind::InvalidInput => VfsError::InvalidPath(msg),
            _ => VfsError::Io(e),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
