//! Virtual filesystem.
//!
//! One namespace over a default backend plus named mounts:
//!
//! - [`normalize`] / [`VirtualPath`] - canonical slash-separated paths
//! - [`VfsOps`] - the trait every storage backend implements
//! - [`RootFs`] - routes virtual paths to backends by longest mount prefix
//! - [`FsPath`] - a path handle with chained operations
//! - [`Walker`] - lazy recursive `find`
//!
//! ## Design Decisions
//!
//! - **Path-based, no handles**: reads take explicit offset and size, so a
//!   chunked download needs no open-file state.
//! - **Errors name virtual paths**: backend errors are relabelled at the
//!   `RootFs` boundary.
//! - **Static mount table**: mounts are added at startup or by tooling;
//!   there is no unmount.

pub mod backends;
mod error;
mod handle;
pub mod mount;
mod ops;
pub mod path;
pub mod pattern;
mod root;
mod types;
mod walk;

pub use backends::{LocalBackend, MemoryBackend, open_backend};
pub use error::{VfsError, VfsResult};
pub use handle::{Download, DownloadBody, FileStat, FsPath};
pub use mount::{MountInfo, MountPoint};
pub use ops::VfsOps;
pub use path::{VirtualPath, normalize, split};
pub use pattern::PatternSet;
pub use root::{ByteStream, CHUNK_SIZE, ResolvedLocation, RootFs};
pub use types::{DirEntry, FileAttr, FileType};
pub use walk::{FindOptions, Walker};
