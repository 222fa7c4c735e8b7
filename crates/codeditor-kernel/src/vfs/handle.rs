//! Path handles bound to a [`RootFs`].

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::time::SystemTime;

use serde::Serialize;

use super::error::{VfsError, VfsResult};
use super::path::{VirtualPath, split};
use super::root::{ByteStream, RootFs};
use super::types::{FileAttr, FileType};

/// Best-effort file metadata. Fields the backend cannot supply are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStat {
    pub kind: FileType,
    pub mode: Option<u32>,
    pub size: Option<u64>,
    pub mtime: Option<SystemTime>,
}

impl From<FileAttr> for FileStat {
    fn from(attr: FileAttr) -> Self {
        Self {
            kind: attr.kind,
            mode: attr.mode,
            size: Some(attr.size),
            mtime: attr.mtime,
        }
    }
}

impl FileStat {
    /// Mode with type bits, falling back to the bare type bits.
    pub fn mode_or_type(&self) -> u32 {
        self.mode.unwrap_or_else(|| self.kind.mode_bits())
    }
}

/// Payload for sending a file to a client.
pub enum DownloadBody {
    /// The file has a native path; send it directly.
    SysPath(PathBuf),
    /// Chunked content from a backend without native paths.
    Stream(ByteStream),
}

impl fmt::Debug for DownloadBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadBody::SysPath(p) => f.debug_tuple("SysPath").field(p).finish(),
            DownloadBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// A file prepared for download.
#[derive(Debug)]
pub struct Download {
    /// Attachment filename, set when the client should save the file.
    pub attachment_name: Option<String>,
    pub body: DownloadBody,
}

/// A virtual path bound to the [`RootFs`] that serves it.
///
/// Handles compare, order and hash by path only.
#[derive(Clone)]
pub struct FsPath<'a> {
    root: &'a RootFs,
    path: VirtualPath,
}

impl<'a> FsPath<'a> {
    pub fn new(root: &'a RootFs, path: &str) -> Self {
        Self {
            root,
            path: VirtualPath::new(path),
        }
    }

    pub(crate) fn from_virtual(root: &'a RootFs, path: VirtualPath) -> Self {
        Self { root, path }
    }

    pub fn path(&self) -> &VirtualPath {
        &self.path
    }

    pub fn root_fs(&self) -> &'a RootFs {
        self.root
    }

    /// Final path segment.
    pub fn name(&self) -> &str {
        self.path.name()
    }

    /// Handle on the containing directory.
    pub fn parent(&self) -> FsPath<'a> {
        FsPath::new(self.root, split(&self.path.to_string()).0)
    }

    /// Handle on `name` below this path.
    pub fn child(&self, name: &str) -> FsPath<'a> {
        FsPath::from_virtual(self.root, self.path.join(name))
    }

    pub async fn exists(&self) -> bool {
        self.root.exists(&self.path).await
    }

    pub async fn is_dir(&self) -> bool {
        self.root.is_dir(&self.path).await
    }

    pub async fn is_file(&self) -> bool {
        self.root.is_file(&self.path).await
    }

    pub async fn stat(&self) -> VfsResult<FileStat> {
        self.root.stat(&self.path).await.map(FileStat::from)
    }

    /// Byte length for files; number of entries for directories.
    pub async fn size(&self) -> VfsResult<u64> {
        let attr = self.root.stat(&self.path).await?;
        if attr.is_dir() {
            let children = self.root.list_children(&self.path, true).await?;
            Ok(children.len() as u64)
        } else {
            Ok(attr.size)
        }
    }

    /// Children of this directory, sorted, skipping mount points.
    pub async fn iterate(&self, include_ignored: bool) -> VfsResult<Vec<FsPath<'a>>> {
        let children = self.root.list_children(&self.path, include_ignored).await?;
        Ok(children.into_iter().map(|e| self.child(&e.name)).collect())
    }

    /// Remove this file, or this directory if it is empty.
    pub async fn delete(&self) -> VfsResult<()> {
        self.root.delete(&self.path).await
    }

    /// Move to `target`, or into it when `target` is a directory.
    pub async fn move_to(&self, target: &str) -> VfsResult<()> {
        let target = self.root.path(target);
        let dest = if target.is_dir().await {
            target.child(self.name())
        } else {
            target
        };
        self.root.move_path(&self.path, &dest.path).await
    }

    pub async fn read_bytes(&self) -> VfsResult<Vec<u8>> {
        self.root.read_bytes(&self.path).await
    }

    pub async fn read_text(&self) -> VfsResult<String> {
        self.root.read_text(&self.path).await
    }

    /// Replace this file's contents, creating parent directories.
    pub async fn write_bytes(&self, data: &[u8]) -> VfsResult<()> {
        self.root.write_bytes(&self.path, data).await
    }

    pub async fn write_text(&self, text: &str) -> VfsResult<()> {
        self.root.write_text(&self.path, text).await
    }

    pub async fn open_stream(&self) -> VfsResult<ByteStream> {
        self.root.open_stream(&self.path).await
    }

    /// Prepare this file for sending to a client.
    ///
    /// Files with a native path are handed over by path; anything else is
    /// streamed in chunks.
    pub async fn send_for_download(&self, as_attachment: bool) -> VfsResult<Download> {
        let attr = self.root.stat(&self.path).await?;
        if attr.is_dir() {
            return Err(VfsError::is_a_directory(self.path.to_string()));
        }
        let attachment_name = as_attachment.then(|| self.name().to_string());
        let body = match self.root.real_path(&self.path).await {
            Ok(Some(path)) => DownloadBody::SysPath(path),
            _ => DownloadBody::Stream(self.open_stream().await?),
        };
        Ok(Download {
            attachment_name,
            body,
        })
    }
}

impl fmt::Debug for FsPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FsPath").field(&self.path.to_string()).finish()
    }
}

impl fmt::Display for FsPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.path, f)
    }
}

impl PartialEq for FsPath<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for FsPath<'_> {}

impl PartialOrd for FsPath<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FsPath<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path.cmp(&other.path)
    }
}

impl Hash for FsPath<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}
