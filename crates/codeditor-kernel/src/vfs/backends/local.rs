//! Local filesystem backend.
//!
//! Serves a directory on the host disk. Every path is resolved below the
//! backend root; symlinks or `..` that would leave it are rejected.

use async_trait::async_trait;
use std::io::SeekFrom;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::VfsOps;
use crate::vfs::types::{DirEntry, FileAttr, FileType};

/// Local filesystem backend.
///
/// All operations are relative to `root`: with `root = /srv/dags`,
/// `read("etl/job.py")` reads `/srv/dags/etl/job.py`.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    read_only: bool,
}

impl LocalBackend {
    /// Serve `root`. The root is canonicalized up front so symlinked
    /// temp directories compare correctly.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = dunce::canonicalize(&root).unwrap_or(root);
        Self {
            root,
            read_only: false,
        }
    }

    /// Serve `root` without allowing writes.
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        let mut backend = Self::new(root);
        backend.read_only = true;
        backend
    }

    /// The host directory this backend serves.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a backend-relative path onto the host, refusing escapes.
    ///
    /// Missing trailing components are allowed (for creates); the deepest
    /// existing ancestor is canonicalized and checked against the root.
    fn resolve(&self, path: &Path) -> VfsResult<PathBuf> {
        let path = path.strip_prefix("/").unwrap_or(path);
        if path.as_os_str().is_empty() {
            return Ok(self.root.clone());
        }
        if path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(VfsError::path_escapes_root(path.display().to_string()));
        }

        let full = self.root.join(path);
        let mut existing = full.as_path();
        let mut missing = Vec::new();
        while !existing.exists() {
            let Some(name) = existing.file_name() else {
                break;
            };
            missing.push(name.to_owned());
            match existing.parent() {
                Some(parent) => existing = parent,
                None => break,
            }
        }

        let mut canonical = dunce::canonicalize(existing)?;
        if !canonical.starts_with(&self.root) {
            return Err(VfsError::path_escapes_root(format!(
                "{} is not under {}",
                canonical.display(),
                self.root.display()
            )));
        }
        for name in missing.into_iter().rev() {
            canonical.push(name);
        }
        Ok(canonical)
    }

    fn check_writable(&self) -> VfsResult<()> {
        if self.read_only {
            Err(VfsError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn metadata_to_attr(meta: &std::fs::Metadata) -> FileAttr {
        let kind = if meta.is_dir() {
            FileType::Directory
        } else if meta.file_type().is_symlink() {
            FileType::Symlink
        } else {
            FileType::File
        };

        FileAttr {
            size: meta.len(),
            kind,
            mode: Some(meta.permissions().mode()),
            mtime: meta.modified().ok(),
        }
    }
}

#[async_trait]
impl VfsOps for LocalBackend {
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
        let full_path = self.resolve(path)?;
        let meta = fs::metadata(&full_path).await?;
        Ok(Self::metadata_to_attr(&meta))
    }

    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        let full_path = self.resolve(path)?;
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&full_path).await?;

        while let Some(entry) = dir.next_entry().await? {
            // Follow symlinks so a linked directory lists as a directory.
            let kind = match fs::metadata(entry.path()).await {
                Ok(meta) if meta.is_dir() => FileType::Directory,
                Ok(_) => FileType::File,
                Err(_) => FileType::Symlink,
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn read(&self, path: &Path, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
        use tokio::io::{AsyncReadExt, AsyncSeekExt};

        let full_path = self.resolve(path)?;
        if fs::metadata(&full_path).await?.is_dir() {
            return Err(VfsError::is_a_directory(path.display().to_string()));
        }
        let mut file = fs::File::open(&full_path).await?;

        file.seek(SeekFrom::Start(offset)).await?;

        let mut buffer = Vec::with_capacity(size.min(1 << 20) as usize);
        file.take(u64::from(size)).read_to_end(&mut buffer).await?;
        Ok(buffer)
    }

    async fn write(&self, path: &Path, offset: u64, data: &[u8]) -> VfsResult<u32> {
        use tokio::io::{AsyncSeekExt, AsyncWriteExt};

        self.check_writable()?;
        let full_path = self.resolve(path)?;

        let mut file = fs::OpenOptions::new().write(true).open(&full_path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(data).await?;
        file.flush().await?;

        Ok(u32::try_from(data.len()).unwrap_or(u32::MAX))
    }

    async fn create(&self, path: &Path, mode: u32) -> VfsResult<FileAttr> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(mode)
            .open(&full_path)
            .await?;

        let meta = file.metadata().await?;
        Ok(Self::metadata_to_attr(&meta))
    }

    async fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<FileAttr> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true).mode(mode);
        builder.create(&full_path).await?;

        let meta = fs::metadata(&full_path).await?;
        if !meta.is_dir() {
            return Err(VfsError::not_a_directory(path.display().to_string()));
        }
        Ok(Self::metadata_to_attr(&meta))
    }

    async fn unlink(&self, path: &Path) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;
        Ok(fs::remove_file(&full_path).await?)
    }

    async fn rmdir(&self, path: &Path) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;
        if full_path == self.root {
            return Err(VfsError::permission_denied("cannot remove backend root"));
        }
        Ok(fs::remove_dir(&full_path).await?)
    }

    async fn rename(&self, from: &Path, to: &Path) -> VfsResult<()> {
        self.check_writable()?;
        let from_path = self.resolve(from)?;
        let to_path = self.resolve(to)?;

        if let Some(parent) = to_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::rename(&from_path, &to_path).await?;
        Ok(())
    }

    async fn truncate(&self, path: &Path, size: u64) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;

        let file = fs::OpenOptions::new().write(true).open(&full_path).await?;
        file.set_len(size).await?;
        Ok(())
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    fn label(&self) -> &'static str {
        "local"
    }

    async fn real_path(&self, path: &Path) -> VfsResult<Option<PathBuf>> {
        let full = self.resolve(path)?;
        let canonical = dunce::canonicalize(&full)?;
        if !canonical.starts_with(&self.root) {
            return Err(VfsError::PermissionDenied(format!(
                "path escapes mount root: {}",
                path.display()
            )));
        }
        Ok(Some(canonical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dags_dir() -> (LocalBackend, TempDir) {
        let dir = TempDir::new().unwrap();
        (LocalBackend::new(dir.path()), dir)
    }

    #[tokio::test]
    async fn reads_honor_offset_and_size() {
        let (backend, _dir) = dags_dir();
        let path = Path::new("etl.py");

        backend.create(path, 0o644).await.unwrap();
        backend.write(path, 0, b"import airflow").await.unwrap();

        assert_eq!(backend.read(path, 0, 1024).await.unwrap(), b"import airflow");
        assert_eq!(backend.read(path, 7, 3).await.unwrap(), b"air");
        assert!(backend.read(path, 100, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_all_creates_missing_parents() {
        let (backend, dir) = dags_dir();

        backend.write_all(Path::new("team/daily/load.py"), b"pass\n").await.unwrap();
        let on_disk = std::fs::read(dir.path().join("team/daily/load.py")).unwrap();
        assert_eq!(on_disk, b"pass\n");
    }

    #[tokio::test]
    async fn readdir_is_sorted_and_mkdir_is_idempotent() {
        let (backend, _dir) = dags_dir();

        backend.mkdir(Path::new("plugins"), 0o755).await.unwrap();
        backend.mkdir(Path::new("plugins"), 0o755).await.unwrap();
        backend.write_all(Path::new("zz.py"), b"").await.unwrap();
        backend.write_all(Path::new("aa.py"), b"").await.unwrap();

        let entries = backend.readdir(Path::new("")).await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["aa.py", "plugins", "zz.py"]);
        assert!(entries[1].kind.is_dir());
    }

    #[tokio::test]
    async fn read_only_mount_refuses_writes() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::read_only(dir.path());

        let err = backend.create(Path::new("etl.py"), 0o644).await.unwrap_err();
        assert!(matches!(err, VfsError::ReadOnly));
        assert!(VfsOps::read_only(&backend));
    }

    #[tokio::test]
    async fn dotdot_cannot_leave_the_root() {
        let (backend, _dir) = dags_dir();

        let err = backend.read(Path::new("../../etc/hostname"), 0, 64).await.unwrap_err();
        assert!(matches!(err, VfsError::PathEscapesRoot(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinks_cannot_leave_the_root() {
        let (backend, dir) = dags_dir();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("airflow.cfg"), "secret").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("escape")).unwrap();

        let err = backend.read(Path::new("escape/airflow.cfg"), 0, 64).await.unwrap_err();
        assert!(matches!(err, VfsError::PathEscapesRoot(_)));
    }

    #[tokio::test]
    async fn rename_moves_into_new_parent_then_truncate() {
        let (backend, _dir) = dags_dir();

        backend.write_all(Path::new("draft.py"), b"print(42)").await.unwrap();
        backend.rename(Path::new("draft.py"), Path::new("done/final.py")).await.unwrap();

        assert!(backend.getattr(Path::new("draft.py")).await.unwrap_err().is_not_found());
        backend.truncate(Path::new("done/final.py"), 5).await.unwrap();
        assert_eq!(backend.read_all(Path::new("done/final.py")).await.unwrap(), b"print");
    }

    #[tokio::test]
    async fn rmdir_refuses_non_empty_directories() {
        let (backend, _dir) = dags_dir();

        backend.write_all(Path::new("old/job.py"), b"x").await.unwrap();
        assert!(backend.rmdir(Path::new("old")).await.is_err());
        backend.unlink(Path::new("old/job.py")).await.unwrap();
        backend.rmdir(Path::new("old")).await.unwrap();
        assert!(!backend.exists(Path::new("old")).await);
        assert!(backend.rmdir(Path::new("")).await.is_err());
    }

    #[tokio::test]
    async fn real_path_is_absolute_for_existing_files() {
        let (backend, dir) = dags_dir();
        std::fs::write(dir.path().join("etl.py"), "").unwrap();

        let real = backend.real_path(Path::new("etl.py")).await.unwrap().unwrap();
        assert!(real.is_absolute());
        assert!(real.ends_with("etl.py"));
        assert!(backend.real_path(Path::new("missing.py")).await.is_err());
    }
}
