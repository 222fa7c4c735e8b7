//! Core VFS types.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Unix file-type bits used when a backend has no real mode to report.
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFLNK: u32 = 0o120000;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
}

impl FileType {
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self, FileType::Symlink)
    }

    /// The `S_IF*` bits for this type.
    pub fn mode_bits(&self) -> u32 {
        match self {
            FileType::File => S_IFREG,
            FileType::Directory => S_IFDIR,
            FileType::Symlink => S_IFLNK,
        }
    }
}

/// File attributes (metadata).
///
/// Fields a backend cannot supply are `None` rather than invented.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttr {
    /// Size in bytes.
    pub size: u64,
    /// File type.
    pub kind: FileType,
    /// Full unix mode including type bits (e.g. `0o100644`), if known.
    pub mode: Option<u32>,
    /// Last modification time, if known.
    pub mtime: Option<SystemTime>,
}

impl FileAttr {
    /// Attributes for a new file.
    pub fn file(size: u64, perm: u32) -> Self {
        Self {
            size,
            kind: FileType::File,
            mode: Some(S_IFREG | (perm & 0o7777)),
            mtime: Some(SystemTime::now()),
        }
    }

    /// Attributes for a new directory.
    pub fn directory(perm: u32) -> Self {
        Self {
            size: 0,
            kind: FileType::Directory,
            mode: Some(S_IFDIR | (perm & 0o7777)),
            mtime: Some(SystemTime::now()),
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Mode with type bits, falling back to the bare type bits.
    pub fn mode_or_type(&self) -> u32 {
        self.mode.unwrap_or_else(|| self.kind.mode_bits())
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type.
    pub kind: FileType,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FileType::File)
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, FileType::Directory)
    }
}
