//! Editor configuration.
//!
//! Loaded from a TOML file with `[git]`, `[fs]`, `[search]` and `[mounts]`
//! sections. Every key has a default, so an empty file is valid.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vfs::mount::{MountPoint, load_mount_points};
use crate::vfs::pattern::{DEFAULT_IGNORE_PATTERNS, PatternSet};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid mount: {0}")]
    InvalidMount(String),

    #[error("unsupported backend scheme: {0}")]
    UnsupportedBackend(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub fs: FsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    /// Raw mount descriptors, see [`crate::vfs::mount`].
    #[serde(default)]
    pub mounts: BTreeMap<String, String>,
}

/// Version-control settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Master switch for every pass-through git command.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Git executable.
    #[serde(default = "default_git_cmd")]
    pub cmd: String,
    /// Arguments prepended to every invocation.
    #[serde(default = "default_git_args")]
    pub default_args: Vec<String>,
    /// Overrides the requesting user's name for commits.
    #[serde(default)]
    pub author_name: Option<String>,
    /// Overrides the requesting user's email for commits.
    #[serde(default)]
    pub author_email: Option<String>,
    /// Initialize a repository in the root mount on first use.
    #[serde(default = "default_true")]
    pub init_repo: bool,
    /// Kill git after this many seconds. Unset means wait forever.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cmd: default_git_cmd(),
            default_args: default_git_args(),
            author_name: None,
            author_email: None,
            init_repo: true,
            timeout_secs: None,
        }
    }
}

/// Filesystem settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsConfig {
    /// Directory served as the default mount.
    #[serde(default)]
    pub root_directory: Option<PathBuf>,
    /// Fallback when `root_directory` is unset. Defaults to the working directory.
    #[serde(default)]
    pub base_directory: Option<PathBuf>,
    /// Names hidden from listings and searches.
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            root_directory: None,
            base_directory: None,
            ignore_patterns: default_ignore_patterns(),
        }
    }
}

/// Search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Lines of context around each match. 0 returns bare matching lines.
    #[serde(default)]
    pub context_lines: usize,
    /// Stop after this many results.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            context_lines: 0,
            max_results: default_max_results(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_git_cmd() -> String {
    "git".to_string()
}

fn default_git_args() -> Vec<String> {
    vec!["-c".to_string(), "color.ui=true".to_string()]
}

fn default_ignore_patterns() -> Vec<String> {
    DEFAULT_IGNORE_PATTERNS.iter().map(|s| s.to_string()).collect()
}

fn default_max_results() -> usize {
    1000
}

impl EditorConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if given, falling back to defaults on any error.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::load(path) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "loaded config");
                config
            }
            Err(e) => {
                tracing::warn!(error = %e, "using default configuration");
                Self::default()
            }
        }
    }

    /// The host directory served at `/`.
    pub fn root_folder(&self) -> PathBuf {
        let folder = self
            .fs
            .root_directory
            .clone()
            .or_else(|| self.fs.base_directory.clone())
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        dunce::canonicalize(&folder).unwrap_or(folder)
    }

    /// Configured mounts, default first.
    pub fn mount_points(&self) -> Vec<MountPoint> {
        load_mount_points(&self.root_folder(), &self.mounts)
    }

    /// Compiled ignore patterns.
    pub fn ignore_set(&self) -> PatternSet {
        PatternSet::new(&self.fs.ignore_patterns)
    }
}
