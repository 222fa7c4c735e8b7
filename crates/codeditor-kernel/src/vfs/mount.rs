//! Mount table configuration.
//!
//! A mount table has exactly one default mount, served at `/`, plus any
//! number of named mounts reachable at `/~name`. Named mounts come from a
//! flat key/value map in one of two encodings:
//!
//! ```toml
//! [mounts]
//! mount = "name=logs,path=/var/log/airflow"
//! mount1 = "name=data,path=mem://"
//! # legacy
//! mount2_name = "scratch"
//! mount2_path = "/tmp/scratch"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use super::path::VirtualPath;
use crate::config::ConfigError;

/// Name of the default mount.
pub const ROOT_MOUNT: &str = "root";

/// Prefix marking a named mount in the virtual namespace.
pub const MOUNT_PREFIX: char = '~';

/// A configured mount: a name bound to a backend location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountPoint {
    pub name: String,
    /// Local path or backend URI (`file://`, `osfs://`, `mem://`).
    pub backend_uri: String,
    pub is_default: bool,
}

impl MountPoint {
    pub fn new(name: impl Into<String>, backend_uri: impl Into<String>) -> Self {
        let name = name.into();
        let is_default = name == ROOT_MOUNT;
        Self {
            name,
            backend_uri: backend_uri.into(),
            is_default,
        }
    }

    /// The default mount serving `backend_uri` at `/`.
    pub fn root(backend_uri: impl Into<String>) -> Self {
        Self::new(ROOT_MOUNT, backend_uri)
    }

    /// Where this mount appears in the virtual namespace.
    pub fn prefix(&self) -> VirtualPath {
        if self.is_default {
            VirtualPath::root()
        } else {
            mount_prefix(&self.name)
        }
    }
}

/// Virtual prefix of the named mount `name` (`/~name`).
pub fn mount_prefix(name: &str) -> VirtualPath {
    VirtualPath::new(&format!("{MOUNT_PREFIX}{name}"))
}

/// Summary of a live mount, as reported by `RootFs::mounts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountInfo {
    pub name: String,
    pub prefix: VirtualPath,
    pub backend: &'static str,
    pub read_only: bool,
    pub is_default: bool,
}

/// Parse a `name=...,path=...` descriptor.
pub fn parse_mount_descriptor(value: &str) -> Result<MountPoint, ConfigError> {
    let mut name = None;
    let mut path = None;
    for part in value.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, val) = part
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidMount(format!("expected key=value in {value:?}")))?;
        match key.trim() {
            "name" => name = Some(val.trim().to_string()),
            "path" => path = Some(val.trim().to_string()),
            other => {
                return Err(ConfigError::InvalidMount(format!(
                    "unknown mount key {other:?} in {value:?}"
                )));
            }
        }
    }
    let name = name.ok_or_else(|| ConfigError::InvalidMount(format!("missing name in {value:?}")))?;
    let path = path.ok_or_else(|| ConfigError::InvalidMount(format!("missing path in {value:?}")))?;
    validate_name(&name)?;
    Ok(MountPoint::new(name, path))
}

fn validate_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(ConfigError::InvalidMount(format!("invalid mount name {name:?}")));
    }
    Ok(())
}

/// Key suffixes `""`, `"1"`, `"2"`, ...
fn suffixes() -> impl Iterator<Item = String> {
    std::iter::once(String::new()).chain((1..).map(|i: u32| i.to_string()))
}

/// Build the mount table from the default location and a `[mounts]` map.
///
/// The default mount always comes first. Entries sharing a name replace
/// earlier ones; a mount named `root` replaces the default. Malformed
/// entries are logged and skipped.
pub fn load_mount_points(default_root: &Path, entries: &BTreeMap<String, String>) -> Vec<MountPoint> {
    let mut points = vec![MountPoint::root(default_root.display().to_string())];
    let mut upsert = |point: MountPoint| {
        match points.iter_mut().find(|p| p.name == point.name) {
            Some(existing) => *existing = point,
            None => points.push(point),
        }
    };

    for suffix in suffixes() {
        let key = format!("mount{suffix}");
        let Some(value) = entries.get(&key) else {
            break;
        };
        match parse_mount_descriptor(value) {
            Ok(point) => upsert(point),
            Err(e) => tracing::warn!(key = %key, error = %e, "skipping mount entry"),
        }
    }

    for suffix in suffixes() {
        let name_key = format!("mount{suffix}_name");
        let Some(name) = entries.get(&name_key) else {
            break;
        };
        let path_key = format!("mount{suffix}_path");
        let Some(path) = entries.get(&path_key) else {
            tracing::warn!(key = %path_key, "skipping mount entry without path");
            continue;
        };
        let name = name.trim();
        if let Err(e) = validate_name(name) {
            tracing::warn!(key = %name_key, error = %e, "skipping mount entry");
            continue;
        }
        upsert(MountPoint::new(name, path.trim()));
    }

    points
}
