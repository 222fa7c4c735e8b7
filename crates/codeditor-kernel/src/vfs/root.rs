//! The unified virtual namespace.
//!
//! [`RootFs`] owns one default backend served at `/` and any number of
//! named backends mounted at `/~name`. Every operation takes a virtual
//! path, normalizes it, routes it to a backend by longest mount prefix and
//! translates backend errors so they name the virtual path.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use parking_lot::RwLock;

use super::backends::open_backend;
use super::error::{VfsError, VfsResult};
use super::handle::FsPath;
use super::mount::{MOUNT_PREFIX, MountInfo, MountPoint, ROOT_MOUNT};
use super::ops::VfsOps;
use super::path::VirtualPath;
use super::pattern::PatternSet;
use super::types::{DirEntry, FileAttr};
use super::walk::{FindOptions, Walker};
use crate::config::{ConfigError, EditorConfig};

/// Chunk size for streamed reads.
pub const CHUNK_SIZE: u32 = 8192;

/// A chunked byte stream over one file.
pub type ByteStream = Pin<Box<dyn Stream<Item = VfsResult<Vec<u8>>> + Send>>;

/// Where a virtual path lives: a backend and the path inside it.
#[derive(Clone)]
pub struct ResolvedLocation {
    pub backend: Arc<dyn VfsOps>,
    pub backend_path: PathBuf,
    /// Name of the serving mount (`root` for the default).
    pub mount: String,
}

impl fmt::Debug for ResolvedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedLocation")
            .field("backend", &self.backend.label())
            .field("backend_path", &self.backend_path)
            .field("mount", &self.mount)
            .finish()
    }
}

struct Mount {
    name: String,
    prefix: VirtualPath,
    backend: Arc<dyn VfsOps>,
}

/// Root filesystem with mount points.
pub struct RootFs {
    default: Arc<dyn VfsOps>,
    mounts: RwLock<Vec<Mount>>,
    ignore: PatternSet,
}

impl fmt::Debug for RootFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefixes: Vec<String> = self
            .mounts
            .read()
            .iter()
            .map(|m| m.prefix.to_string())
            .collect();
        f.debug_struct("RootFs")
            .field("default", &self.default.label())
            .field("mounts", &prefixes)
            .field("ignore", &self.ignore)
            .finish()
    }
}

impl RootFs {
    /// A namespace served entirely by `default`, with the default ignore list.
    pub fn new(default: Arc<dyn VfsOps>) -> Self {
        Self {
            default,
            mounts: RwLock::new(Vec::new()),
            ignore: PatternSet::default_ignore(),
        }
    }

    /// Replace the ignore list used by [`RootFs::list_children`].
    pub fn with_ignore_patterns(mut self, ignore: PatternSet) -> Self {
        self.ignore = ignore;
        self
    }

    /// Open every configured mount.
    ///
    /// The default mount must open; named mounts that fail are logged and
    /// left out.
    pub fn from_mount_points(points: &[MountPoint], ignore: PatternSet) -> Result<Self, ConfigError> {
        let default = points
            .iter()
            .rev()
            .find(|p| p.is_default)
            .ok_or_else(|| ConfigError::InvalidMount("no default mount configured".into()))?;
        let fs = Self::new(open_backend(&default.backend_uri)?).with_ignore_patterns(ignore);

        for point in points.iter().filter(|p| !p.is_default) {
            let backend = match open_backend(&point.backend_uri) {
                Ok(backend) => backend,
                Err(e) => {
                    tracing::warn!(mount = %point.name, error = %e, "skipping mount");
                    continue;
                }
            };
            if let Err(e) = fs.mount(&point.prefix().to_string(), backend) {
                tracing::warn!(mount = %point.name, error = %e, "skipping mount");
            }
        }
        Ok(fs)
    }

    /// Build the namespace described by `config`.
    pub fn from_config(config: &EditorConfig) -> Result<Self, ConfigError> {
        Self::from_mount_points(&config.mount_points(), config.ignore_set())
    }

    /// Names hidden from default listings.
    pub fn ignore_patterns(&self) -> &PatternSet {
        &self.ignore
    }

    /// The backend serving `/`.
    pub fn default_backend(&self) -> Arc<dyn VfsOps> {
        Arc::clone(&self.default)
    }

    // ========================================================================
    // Mount table
    // ========================================================================

    /// Mount `backend` at `prefix`.
    ///
    /// Fails with `MountOverlap` when `prefix` is the root, or is a parent or
    /// child of an existing mount. A prefix of the form `/~name` is reported
    /// under `name`.
    pub fn mount(&self, prefix: &str, backend: Arc<dyn VfsOps>) -> VfsResult<()> {
        let prefix = VirtualPath::new(prefix);
        if prefix.is_root() {
            return Err(VfsError::mount_overlap("/"));
        }

        let mut mounts = self.mounts.write();
        if let Some(existing) = mounts
            .iter()
            .find(|m| prefix.starts_with(&m.prefix) || m.prefix.starts_with(&prefix))
        {
            return Err(VfsError::mount_overlap(format!(
                "{prefix} overlaps {}",
                existing.prefix
            )));
        }

        let rel = prefix.as_relative();
        let name = match rel.strip_prefix(MOUNT_PREFIX) {
            Some(name) if prefix.depth() == 1 => name.to_string(),
            _ => rel.to_string(),
        };
        tracing::debug!(%prefix, backend = backend.label(), "mounted");
        mounts.push(Mount {
            name,
            prefix,
            backend,
        });
        Ok(())
    }

    /// Every live mount, default first.
    pub fn mounts(&self) -> Vec<MountInfo> {
        let mut infos = vec![MountInfo {
            name: ROOT_MOUNT.to_string(),
            prefix: VirtualPath::root(),
            backend: self.default.label(),
            read_only: self.default.read_only(),
            is_default: true,
        }];
        infos.extend(self.mounts.read().iter().map(|m| MountInfo {
            name: m.name.clone(),
            prefix: m.prefix.clone(),
            backend: m.backend.label(),
            read_only: m.backend.read_only(),
            is_default: false,
        }));
        infos
    }

    /// Names of the non-default mounts, sorted.
    pub fn mount_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.mounts.read().iter().map(|m| m.name.clone()).collect();
        names.sort();
        names
    }

    /// True if `path` is exactly a mount prefix.
    pub fn is_mount_point(&self, path: impl AsRef<str>) -> bool {
        let path = VirtualPath::new(path.as_ref());
        self.mounts.read().iter().any(|m| m.prefix == path)
    }

    /// Mount prefixes whose parent directory is `dir`.
    pub(crate) fn mounts_below(&self, dir: &VirtualPath) -> Vec<VirtualPath> {
        self.mounts
            .read()
            .iter()
            .filter(|m| !m.prefix.is_root() && m.prefix.parent() == *dir)
            .map(|m| m.prefix.clone())
            .collect()
    }

    /// Route `path` to its backend by longest matching mount prefix.
    pub fn resolve(&self, path: impl AsRef<str>) -> ResolvedLocation {
        self.resolve_virtual(&VirtualPath::new(path.as_ref()))
    }

    fn resolve_virtual(&self, path: &VirtualPath) -> ResolvedLocation {
        let mounts = self.mounts.read();
        let best = mounts
            .iter()
            .filter(|m| path.starts_with(&m.prefix))
            .max_by_key(|m| m.prefix.depth());
        match best {
            Some(m) => ResolvedLocation {
                backend: Arc::clone(&m.backend),
                backend_path: PathBuf::from(path.strip_prefix(&m.prefix).unwrap_or_default()),
                mount: m.name.clone(),
            },
            None => ResolvedLocation {
                backend: Arc::clone(&self.default),
                backend_path: PathBuf::from(path.as_relative()),
                mount: ROOT_MOUNT.to_string(),
            },
        }
    }

    /// Root and mount points cannot be removed or moved.
    fn guard_structural(&self, path: &VirtualPath) -> VfsResult<()> {
        if path.is_root() || self.is_mount_point(path) {
            return Err(VfsError::permission_denied(path.to_string()));
        }
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Attributes of `path`.
    pub async fn stat(&self, path: impl AsRef<str>) -> VfsResult<FileAttr> {
        let path = VirtualPath::new(path.as_ref());
        let loc = self.resolve_virtual(&path);
        loc.backend
            .getattr(&loc.backend_path)
            .await
            .map_err(|e| e.with_path(path.to_string()))
    }

    /// True if `path` exists. Backend errors count as absent.
    pub async fn exists(&self, path: impl AsRef<str>) -> bool {
        self.stat(path).await.is_ok()
    }

    pub async fn is_dir(&self, path: impl AsRef<str>) -> bool {
        self.stat(path).await.map(|a| a.is_dir()).unwrap_or(false)
    }

    pub async fn is_file(&self, path: impl AsRef<str>) -> bool {
        self.stat(path).await.map(|a| a.is_file()).unwrap_or(false)
    }

    /// Children of the directory `path`, sorted by name.
    ///
    /// Ignored names are dropped unless `include_ignored` is set. Entries
    /// that are themselves mount points are always dropped.
    pub async fn list_children(
        &self,
        path: impl AsRef<str>,
        include_ignored: bool,
    ) -> VfsResult<Vec<DirEntry>> {
        let path = VirtualPath::new(path.as_ref());
        let loc = self.resolve_virtual(&path);
        let entries = loc
            .backend
            .readdir(&loc.backend_path)
            .await
            .map_err(|e| e.with_path(path.to_string()))?;

        let mut children: Vec<DirEntry> = entries
            .into_iter()
            .filter(|e| include_ignored || !self.ignore.matches(&e.name, e.kind.is_dir()))
            .filter(|e| !self.is_mount_point(path.join(&e.name)))
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    /// Native path of `path`, when its backend has one.
    pub async fn real_path(&self, path: impl AsRef<str>) -> VfsResult<Option<PathBuf>> {
        let path = VirtualPath::new(path.as_ref());
        let loc = self.resolve_virtual(&path);
        loc.backend
            .real_path(&loc.backend_path)
            .await
            .map_err(|e| e.with_path(path.to_string()))
    }

    // ========================================================================
    // Directories and removal
    // ========================================================================

    /// Create `path` and any missing parents.
    ///
    /// An existing directory is an error unless `existing_ok`.
    pub async fn make_directories(&self, path: impl AsRef<str>, existing_ok: bool) -> VfsResult<()> {
        let path = VirtualPath::new(path.as_ref());
        match self.stat(&path).await {
            Ok(attr) if attr.is_dir() && existing_ok => return Ok(()),
            Ok(_) => return Err(VfsError::already_exists(path.to_string())),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        let loc = self.resolve_virtual(&path);
        loc.backend
            .mkdir(&loc.backend_path, 0o755)
            .await
            .map_err(|e| e.with_path(path.to_string()))?;
        Ok(())
    }

    /// Remove the file `path`.
    pub async fn remove(&self, path: impl AsRef<str>) -> VfsResult<()> {
        let path = VirtualPath::new(path.as_ref());
        self.guard_structural(&path)?;
        let loc = self.resolve_virtual(&path);
        loc.backend
            .unlink(&loc.backend_path)
            .await
            .map_err(|e| e.with_path(path.to_string()))
    }

    /// Remove the empty directory `path`.
    pub async fn remove_directory(&self, path: impl AsRef<str>) -> VfsResult<()> {
        let path = VirtualPath::new(path.as_ref());
        self.guard_structural(&path)?;
        let loc = self.resolve_virtual(&path);
        loc.backend
            .rmdir(&loc.backend_path)
            .await
            .map_err(|e| e.with_path(path.to_string()))
    }

    /// Remove `path`, dispatching on whether it is a directory.
    pub async fn delete(&self, path: impl AsRef<str>) -> VfsResult<()> {
        let path = VirtualPath::new(path.as_ref());
        if self.stat(&path).await?.is_dir() {
            self.remove_directory(&path).await
        } else {
            self.remove(&path).await
        }
    }

    // ========================================================================
    // Move and copy
    // ========================================================================

    /// Move `src` to exactly `dst`.
    ///
    /// Within one backend this is a rename. Across backends a file is
    /// streamed through memory and the source removed; directories fail
    /// with `CrossBackendUnsupported`.
    pub async fn move_path(&self, src: impl AsRef<str>, dst: impl AsRef<str>) -> VfsResult<()> {
        let src = VirtualPath::new(src.as_ref());
        let dst = VirtualPath::new(dst.as_ref());
        self.guard_structural(&src)?;
        if dst.is_root() || self.is_mount_point(&dst) {
            return Err(VfsError::already_exists(dst.to_string()));
        }

        let from = self.resolve_virtual(&src);
        let to = self.resolve_virtual(&dst);
        let attr = from
            .backend
            .getattr(&from.backend_path)
            .await
            .map_err(|e| e.with_path(src.to_string()))?;

        if Arc::ptr_eq(&from.backend, &to.backend) {
            tracing::debug!(%src, %dst, "rename");
            return from
                .backend
                .rename(&from.backend_path, &to.backend_path)
                .await
                .map_err(|e| e.with_path(src.to_string()));
        }
        if attr.is_dir() {
            return Err(VfsError::cross_backend(format!("{src} -> {dst}")));
        }

        tracing::debug!(%src, %dst, from = %from.mount, to = %to.mount, "cross-backend move");
        self.transfer(&from, &src, &to, &dst).await?;
        from.backend
            .unlink(&from.backend_path)
            .await
            .map_err(|e| e.with_path(src.to_string()))
    }

    /// Copy the file `src` to `dst`, possibly across backends.
    pub async fn copy(&self, src: impl AsRef<str>, dst: impl AsRef<str>) -> VfsResult<()> {
        let src = VirtualPath::new(src.as_ref());
        let dst = VirtualPath::new(dst.as_ref());
        let from = self.resolve_virtual(&src);
        let to = self.resolve_virtual(&dst);
        let attr = from
            .backend
            .getattr(&from.backend_path)
            .await
            .map_err(|e| e.with_path(src.to_string()))?;
        if attr.is_dir() {
            return Err(VfsError::is_a_directory(src.to_string()));
        }
        self.transfer(&from, &src, &to, &dst).await
    }

    async fn transfer(
        &self,
        from: &ResolvedLocation,
        src: &VirtualPath,
        to: &ResolvedLocation,
        dst: &VirtualPath,
    ) -> VfsResult<()> {
        let data = from
            .backend
            .read_all(&from.backend_path)
            .await
            .map_err(|e| e.with_path(src.to_string()))?;
        to.backend
            .write_all(&to.backend_path, &data)
            .await
            .map_err(|e| e.with_path(dst.to_string()))
    }

    // ========================================================================
    // Content
    // ========================================================================

    pub async fn read_bytes(&self, path: impl AsRef<str>) -> VfsResult<Vec<u8>> {
        let path = VirtualPath::new(path.as_ref());
        let loc = self.resolve_virtual(&path);
        loc.backend
            .read_all(&loc.backend_path)
            .await
            .map_err(|e| e.with_path(path.to_string()))
    }

    /// Read `path` as UTF-8 text.
    pub async fn read_text(&self, path: impl AsRef<str>) -> VfsResult<String> {
        let path = VirtualPath::new(path.as_ref());
        let bytes = self.read_bytes(&path).await?;
        String::from_utf8(bytes).map_err(|_| {
            VfsError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{path} is not valid UTF-8"),
            ))
        })
    }

    /// Replace the contents of `path`, creating it and its parents.
    pub async fn write_bytes(&self, path: impl AsRef<str>, data: &[u8]) -> VfsResult<()> {
        let path = VirtualPath::new(path.as_ref());
        if path.is_root() || self.is_mount_point(&path) {
            return Err(VfsError::is_a_directory(path.to_string()));
        }
        let loc = self.resolve_virtual(&path);
        loc.backend
            .write_all(&loc.backend_path, data)
            .await
            .map_err(|e| e.with_path(path.to_string()))
    }

    pub async fn write_text(&self, path: impl AsRef<str>, text: &str) -> VfsResult<()> {
        self.write_bytes(path, text.as_bytes()).await
    }

    /// Stream `path` in [`CHUNK_SIZE`] chunks without buffering the file.
    pub async fn open_stream(&self, path: impl AsRef<str>) -> VfsResult<ByteStream> {
        self.open_stream_with_chunk_size(path, CHUNK_SIZE).await
    }

    pub async fn open_stream_with_chunk_size(
        &self,
        path: impl AsRef<str>,
        chunk_size: u32,
    ) -> VfsResult<ByteStream> {
        let path = VirtualPath::new(path.as_ref());
        let loc = self.resolve_virtual(&path);
        let attr = loc
            .backend
            .getattr(&loc.backend_path)
            .await
            .map_err(|e| e.with_path(path.to_string()))?;
        if attr.is_dir() {
            return Err(VfsError::is_a_directory(path.to_string()));
        }

        let chunk_size = chunk_size.max(1);
        let ResolvedLocation {
            backend,
            backend_path,
            ..
        } = loc;
        let stream = futures::stream::unfold(Some(0u64), move |offset| {
            let backend = Arc::clone(&backend);
            let backend_path = backend_path.clone();
            let path = path.clone();
            async move {
                let offset = offset?;
                match backend.read(&backend_path, offset, chunk_size).await {
                    Ok(chunk) if chunk.is_empty() => None,
                    Ok(chunk) => {
                        let next = offset + chunk.len() as u64;
                        Some((Ok(chunk), Some(next)))
                    }
                    Err(e) => Some((Err(e.with_path(path.to_string())), None)),
                }
            }
        });
        Ok(Box::pin(stream))
    }

    // ========================================================================
    // Handles and traversal
    // ========================================================================

    /// A handle on `path`.
    pub fn path(&self, path: impl AsRef<str>) -> FsPath<'_> {
        FsPath::new(self, path.as_ref())
    }

    /// Walk the tree below `start`, yielding files.
    pub fn find(&self, start: impl AsRef<str>, options: FindOptions) -> Walker<'_> {
        Walker::new(self, VirtualPath::new(start.as_ref()), options)
    }
}
