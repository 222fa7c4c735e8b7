//! # codeditor-kernel
//!
//! Core of a browser file manager and git client.
//!
//! - One virtual namespace over a default directory plus named mounts
//!   reachable as `/~name`
//! - Path handles, lazy `find` and content search over that namespace
//! - A git bridge that serializes every command behind one lock, serves a
//!   few pseudo-commands from the namespace and passes an allow-list of
//!   verbs to the git executable

pub mod config;
pub mod editor;
pub mod git;
pub mod search;
pub mod tree;
pub mod vfs;

pub use config::{ConfigError, EditorConfig, FsConfig, GitConfig, SearchConfig};
pub use editor::{CodeEditor, DirectoryEntry, FileContent};
pub use git::{GitBridge, GitIdentity, GitInvocation, LOCAL_COMMANDS, SUPPORTED_GIT_COMMANDS};
pub use search::{SearchError, SearchMatch, SearchOptions};
pub use tree::{TreeItem, TreeNode, get_tree};
pub use vfs::{
    DirEntry, FileAttr, FileType, FindOptions, FsPath, LocalBackend, MemoryBackend, RootFs,
    VfsError, VfsOps, VfsResult, VirtualPath, normalize, split,
};
