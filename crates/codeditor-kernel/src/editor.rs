//! The call surface consumed by an HTTP adapter or the CLI.
//!
//! [`CodeEditor`] ties together the namespace, the git bridge and search.
//! It knows nothing about transports: file errors come back as
//! [`VfsError`], git failures as a nonzero [`GitInvocation`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;

use crate::config::{ConfigError, EditorConfig};
use crate::git::{GitBridge, GitIdentity, GitInvocation};
use crate::search::{self, SearchError, SearchMatch, SearchOptions};
use crate::tree::{self, TreeItem};
use crate::vfs::{FileType, ResolvedLocation, RootFs, VfsError, VfsResult, VirtualPath, normalize};

/// Virtual prefix for reading objects straight out of the repository.
pub const GIT_BLOB_PREFIX: &str = "~git/";

/// File content with a content-type hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub data: Vec<u8>,
    pub mime: &'static str,
    /// Name the client should save the file as.
    pub attachment_name: Option<String>,
}

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub path: VirtualPath,
    pub kind: FileType,
    pub mode: u32,
    /// Bytes for files, entries for directories. Long listings only.
    pub size: Option<u64>,
    /// Long listings only.
    pub mtime: Option<SystemTime>,
}

pub struct CodeEditor {
    config: EditorConfig,
    fs: Arc<RootFs>,
    git: GitBridge,
}

impl CodeEditor {
    /// Open the namespace described by `config`.
    ///
    /// Git runs in the native directory behind the default mount, falling
    /// back to the configured root folder when that mount has none.
    pub async fn open(config: EditorConfig) -> Result<Self, ConfigError> {
        let fs = Arc::new(RootFs::from_config(&config)?);
        let workdir = match fs.real_path("/").await {
            Ok(Some(path)) => path,
            _ => config.root_folder(),
        };
        Ok(Self::from_parts(config, fs, workdir))
    }

    /// Assemble from an existing namespace.
    pub fn from_parts(config: EditorConfig, fs: Arc<RootFs>, workdir: impl Into<PathBuf>) -> Self {
        let git = GitBridge::new(config.git.clone(), Arc::clone(&fs), workdir);
        Self { config, fs, git }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn fs(&self) -> &RootFs {
        &self.fs
    }

    pub fn git(&self) -> &GitBridge {
        &self.git
    }

    pub fn workdir(&self) -> &Path {
        self.git.workdir()
    }

    pub fn resolve_path(&self, path: &str) -> ResolvedLocation {
        self.fs.resolve(path)
    }

    /// Read a file, or a repository object for `~git/<object>/<name>`.
    pub async fn read_file(&self, path: &str) -> VfsResult<FileContent> {
        let normalized = normalize(path);
        if let Some(blob_ref) = normalized.strip_prefix(GIT_BLOB_PREFIX) {
            return self.read_git_blob(blob_ref).await;
        }
        let handle = self.fs.path(&normalized);
        let data = handle.read_bytes().await?;
        Ok(FileContent {
            data,
            mime: mime_hint(handle.name()),
            attachment_name: Some(handle.name().to_string()),
        })
    }

    async fn read_git_blob(&self, blob_ref: &str) -> VfsResult<FileContent> {
        let (object, name) = match blob_ref.split_once('/') {
            Some((object, name)) => (object, Some(name)),
            None => (blob_ref, None),
        };
        if object.is_empty() || object.starts_with('-') {
            return Err(VfsError::not_found(format!("{GIT_BLOB_PREFIX}{blob_ref}")));
        }
        let argv = ["cat-file", "-p", object];
        let inv = self.git.run_args(&argv, &GitIdentity::default()).await;
        if !inv.is_success() {
            tracing::debug!(object, stderr = %inv.stderr_text(), "git object not found");
            return Err(VfsError::not_found(format!("{GIT_BLOB_PREFIX}{blob_ref}")));
        }
        Ok(FileContent {
            data: inv.stdout,
            mime: name.map_or("text/plain", mime_hint),
            attachment_name: name.map(|n| n.to_string()),
        })
    }

    /// Write a file, creating parents.
    ///
    /// Text is saved with carriage returns removed, trailing whitespace
    /// stripped and a single final newline.
    pub async fn write_file(&self, path: &str, data: &[u8], is_text: bool) -> VfsResult<()> {
        if is_text {
            let text = normalize_text(&String::from_utf8_lossy(data));
            self.fs.write_text(path, &text).await
        } else {
            self.fs.write_bytes(path, data).await
        }
    }

    /// Delete a file or empty directory. Repository objects are read-only.
    pub async fn delete_file(&self, path: &str) -> VfsResult<()> {
        let normalized = normalize(path);
        if normalized.starts_with(GIT_BLOB_PREFIX) {
            return Err(VfsError::permission_denied(format!("/{normalized}")));
        }
        self.fs.delete(&normalized).await
    }

    /// Children of a directory, sorted by name.
    pub async fn list_directory(
        &self,
        path: &str,
        long: bool,
        include_ignored: bool,
    ) -> VfsResult<Vec<DirectoryEntry>> {
        let mut entries = Vec::new();
        for item in self.fs.path(path).iterate(include_ignored).await? {
            let stat = item.stat().await?;
            let (size, mtime) = if long {
                (item.size().await.ok(), stat.mtime)
            } else {
                (None, None)
            };
            entries.push(DirectoryEntry {
                name: item.name().to_string(),
                path: item.path().clone(),
                kind: stat.kind,
                mode: stat.mode_or_type(),
                size,
                mtime,
            });
        }
        Ok(entries)
    }

    /// Search the whole namespace. `context_lines` overrides the configured default.
    pub async fn search(
        &self,
        query: &str,
        context_lines: Option<usize>,
    ) -> Result<Vec<SearchMatch>, SearchError> {
        let options = SearchOptions {
            context_lines: context_lines.unwrap_or(self.config.search.context_lines),
            max_results: self.config.search.max_results,
            ..SearchOptions::default()
        };
        search::search(&self.fs, query, &options).await
    }

    pub async fn run_git_command(&self, argv: &[String], identity: &GitIdentity) -> GitInvocation {
        self.git.run(argv, identity).await
    }

    /// Names of the non-default mounts, sorted.
    pub fn mount_list(&self) -> Vec<String> {
        self.fs.mount_names()
    }

    pub async fn tree(&self, path: Option<&str>) -> VfsResult<Vec<TreeItem>> {
        tree::get_tree(&self.git, path).await
    }
}

fn normalize_text(text: &str) -> String {
    let mut out = text.replace('\r', "");
    out.truncate(out.trim_end().len());
    out.push('\n');
    out
}

/// Content type guessed from a file name's extension.
pub fn mime_hint(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("py") => "text/x-python",
        Some("txt" | "log" | "cfg" | "ini" | "conf") => "text/plain",
        Some("md") => "text/markdown",
        Some("html" | "htm") => "text/html",
        Some("css") => "text/css",
        Some("csv") => "text/csv",
        Some("js") => "text/javascript",
        Some("json") => "application/json",
        Some("yaml" | "yml") => "application/yaml",
        Some("toml") => "application/toml",
        Some("xml") => "application/xml",
        Some("sql") => "application/sql",
        Some("sh") => "application/x-sh",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        _ => "application/octet-stream",
    }
}
