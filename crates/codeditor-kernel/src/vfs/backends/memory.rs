//! In-memory filesystem backend.
//!
//! Backs `mem://` mounts and most tests. All data is ephemeral.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::VfsOps;
use crate::vfs::types::{DirEntry, FileAttr, FileType};

#[derive(Debug, Clone)]
enum Entry {
    File { data: Vec<u8>, attr: FileAttr },
    Directory { attr: FileAttr },
}

impl Entry {
    fn attr(&self) -> FileAttr {
        match self {
            Entry::File { data, attr } => FileAttr {
                size: data.len() as u64,
                ..attr.clone()
            },
            Entry::Directory { attr } => attr.clone(),
        }
    }

    fn kind(&self) -> FileType {
        match self {
            Entry::File { .. } => FileType::File,
            Entry::Directory { .. } => FileType::Directory,
        }
    }
}

/// In-memory filesystem backend.
///
/// Entries are keyed by backend-relative path; the empty path is the root
/// directory. Keys are ordered, so listings come out sorted.
#[derive(Debug)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<PathBuf, Entry>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            PathBuf::new(),
            Entry::Directory {
                attr: FileAttr::directory(0o755),
            },
        );
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Remove leading `/`, resolve `.` and `..`.
    fn normalize(path: &Path) -> PathBuf {
        let mut result = PathBuf::new();
        for component in path.components() {
            match component {
                Component::ParentDir => {
                    result.pop();
                }
                Component::Normal(s) => result.push(s),
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            }
        }
        result
    }

    /// Create missing ancestors of `path`. Fails if one of them is a file.
    fn ensure_parents(entries: &mut BTreeMap<PathBuf, Entry>, path: &Path) -> VfsResult<()> {
        let mut current = PathBuf::new();
        for component in path.parent().into_iter().flat_map(|p| p.components()) {
            current.push(component);
            match entries.get(&current) {
                Some(Entry::Directory { .. }) => {}
                Some(Entry::File { .. }) => {
                    return Err(VfsError::not_a_directory(Self::path_str(&current)));
                }
                None => {
                    entries.insert(
                        current.clone(),
                        Entry::Directory {
                            attr: FileAttr::directory(0o755),
                        },
                    );
                }
            }
        }
        Ok(())
    }

    fn path_str(path: &Path) -> String {
        path.display().to_string()
    }
}

#[async_trait]
impl VfsOps for MemoryBackend {
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
        let normalized = Self::normalize(path);
        let entries = self.entries.read();
        entries
            .get(&normalized)
            .map(Entry::attr)
            .ok_or_else(|| VfsError::not_found(Self::path_str(&normalized)))
    }

    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        let normalized = Self::normalize(path);
        let entries = self.entries.read();

        match entries.get(&normalized) {
            Some(Entry::Directory { .. }) => {}
            Some(_) => return Err(VfsError::not_a_directory(Self::path_str(&normalized))),
            None => return Err(VfsError::not_found(Self::path_str(&normalized))),
        }

        let result: Vec<DirEntry> = entries
            .iter()
            .filter(|(p, _)| p.parent() == Some(normalized.as_path()))
            .filter_map(|(p, e)| {
                let name = p.file_name()?.to_string_lossy().into_owned();
                Some(DirEntry::new(name, e.kind()))
            })
            .collect();
        Ok(result)
    }

    async fn read(&self, path: &Path, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
        let normalized = Self::normalize(path);
        let entries = self.entries.read();

        match entries.get(&normalized) {
            Some(Entry::File { data, .. }) => {
                let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
                let end = start.saturating_add(size as usize).min(data.len());
                Ok(data[start..end].to_vec())
            }
            Some(Entry::Directory { .. }) => {
                Err(VfsError::is_a_directory(Self::path_str(&normalized)))
            }
            None => Err(VfsError::not_found(Self::path_str(&normalized))),
        }
    }

    async fn write(&self, path: &Path, offset: u64, data: &[u8]) -> VfsResult<u32> {
        let normalized = Self::normalize(path);
        let mut entries = self.entries.write();

        match entries.get_mut(&normalized) {
            Some(Entry::File {
                data: file_data,
                attr,
            }) => {
                let offset = usize::try_from(offset)
                    .map_err(|_| VfsError::invalid_path("offset out of range"))?;
                let end = offset + data.len();
                if end > file_data.len() {
                    file_data.resize(end, 0);
                }
                file_data[offset..end].copy_from_slice(data);
                attr.size = file_data.len() as u64;
                attr.mtime = Some(SystemTime::now());
                Ok(u32::try_from(data.len()).unwrap_or(u32::MAX))
            }
            Some(Entry::Directory { .. }) => {
                Err(VfsError::is_a_directory(Self::path_str(&normalized)))
            }
            None => Err(VfsError::not_found(Self::path_str(&normalized))),
        }
    }

    async fn create(&self, path: &Path, mode: u32) -> VfsResult<FileAttr> {
        let normalized = Self::normalize(path);
        if normalized.as_os_str().is_empty() {
            return Err(VfsError::already_exists("/"));
        }
        let mut entries = self.entries.write();

        if entries.contains_key(&normalized) {
            return Err(VfsError::already_exists(Self::path_str(&normalized)));
        }
        Self::ensure_parents(&mut entries, &normalized)?;

        let attr = FileAttr::file(0, mode);
        entries.insert(
            normalized,
            Entry::File {
                data: Vec::new(),
                attr: attr.clone(),
            },
        );
        Ok(attr)
    }

    async fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<FileAttr> {
        let normalized = Self::normalize(path);
        let mut entries = self.entries.write();

        if let Some(existing) = entries.get(&normalized) {
            return match existing {
                Entry::Directory { attr } => Ok(attr.clone()),
                Entry::File { .. } => Err(VfsError::already_exists(Self::path_str(&normalized))),
            };
        }
        Self::ensure_parents(&mut entries, &normalized)?;

        let attr = FileAttr::directory(mode);
        entries.insert(normalized, Entry::Directory { attr: attr.clone() });
        Ok(attr)
    }

    async fn unlink(&self, path: &Path) -> VfsResult<()> {
        let normalized = Self::normalize(path);
        let mut entries = self.entries.write();

        match entries.get(&normalized) {
            Some(Entry::Directory { .. }) => {
                Err(VfsError::is_a_directory(Self::path_str(&normalized)))
            }
            Some(Entry::File { .. }) => {
                entries.remove(&normalized);
                Ok(())
            }
            None => Err(VfsError::not_found(Self::path_str(&normalized))),
        }
    }

    async fn rmdir(&self, path: &Path) -> VfsResult<()> {
        let normalized = Self::normalize(path);
        if normalized.as_os_str().is_empty() {
            return Err(VfsError::permission_denied("cannot remove backend root"));
        }
        let mut entries = self.entries.write();

        match entries.get(&normalized) {
            Some(Entry::Directory { .. }) => {}
            Some(_) => return Err(VfsError::not_a_directory(Self::path_str(&normalized))),
            None => return Err(VfsError::not_found(Self::path_str(&normalized))),
        }

        if entries.keys().any(|k| k.parent() == Some(normalized.as_path())) {
            return Err(VfsError::directory_not_empty(Self::path_str(&normalized)));
        }

        entries.remove(&normalized);
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> VfsResult<()> {
        let from_normalized = Self::normalize(from);
        let to_normalized = Self::normalize(to);
        if from_normalized.as_os_str().is_empty() {
            return Err(VfsError::permission_denied("cannot move backend root"));
        }
        if to_normalized.starts_with(&from_normalized) && to_normalized != from_normalized {
            return Err(VfsError::invalid_path(format!(
                "cannot move {} into itself",
                from_normalized.display()
            )));
        }

        let mut entries = self.entries.write();
        if !entries.contains_key(&from_normalized) {
            return Err(VfsError::not_found(Self::path_str(&from_normalized)));
        }
        Self::ensure_parents(&mut entries, &to_normalized)?;

        let moved: Vec<PathBuf> = entries
            .keys()
            .filter(|k| k.starts_with(&from_normalized))
            .cloned()
            .collect();
        for old in moved {
            if let Some(entry) = entries.remove(&old) {
                let new_path = match old.strip_prefix(&from_normalized) {
                    Ok(rel) if !rel.as_os_str().is_empty() => to_normalized.join(rel),
                    _ => to_normalized.clone(),
                };
                entries.insert(new_path, entry);
            }
        }
        Ok(())
    }

    async fn truncate(&self, path: &Path, size: u64) -> VfsResult<()> {
        let normalized = Self::normalize(path);
        let mut entries = self.entries.write();

        match entries.get_mut(&normalized) {
            Some(Entry::File { data, attr }) => {
                let len = usize::try_from(size)
                    .map_err(|_| VfsError::invalid_path("size out of range"))?;
                data.resize(len, 0);
                attr.size = size;
                attr.mtime = Some(SystemTime::now());
                Ok(())
            }
            Some(Entry::Directory { .. }) => {
                Err(VfsError::is_a_directory(Self::path_str(&normalized)))
            }
            None => Err(VfsError::not_found(Self::path_str(&normalized))),
        }
    }

    fn read_only(&self) -> bool {
        false
    }

    fn label(&self) -> &'static str {
        "memory"
    }
}
