//! Git command bridge.
//!
//! Every request runs under one process-wide lock: local pseudo-commands
//! (`mounts`, `ls-local`, `rm-local`, `mv-local`, `help`) are served by the
//! virtual filesystem, allow-listed verbs are passed to the git executable,
//! and anything else is refused. Failures never escape as errors; they come
//! back as a [`GitInvocation`] with a nonzero return code.

mod bootstrap;
mod bridge;
mod local;

pub use bridge::GitBridge;

use serde::Serialize;
use thiserror::Error;

use crate::vfs::VfsError;

/// Verbs forwarded to the git executable.
pub const SUPPORTED_GIT_COMMANDS: &[&str] = &[
    "add",
    "branch",
    "cat-file",
    "checkout",
    "commit",
    "diff",
    "for-each-ref",
    "log",
    "ls-tree",
    "pull",
    "push",
    "reset",
    "rm",
    "show",
    "stage",
    "status",
    "tag",
    "unstage",
];

/// Verbs served without spawning a process.
pub const LOCAL_COMMANDS: &[&str] = &["help", "ls-local", "mounts", "mv-local", "rm-local"];

/// Branch used by repository bootstrap when git has no configured default.
pub const DEFAULT_GIT_BRANCH: &str = "main";

/// Return code reported when a git process is killed for running too long.
pub const TIMEOUT_RETURN_CODE: i32 = 124;

/// Who is asking. Used for commit authorship unless the config overrides it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitIdentity {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl GitIdentity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: Some(email.into()),
        }
    }
}

/// Outcome of one bridge call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitInvocation {
    /// First argument, if any.
    pub command: Option<String>,
    pub args: Vec<String>,
    pub returncode: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl GitInvocation {
    pub(crate) fn new(args: &[String]) -> Self {
        Self {
            command: args.first().cloned(),
            args: args.to_vec(),
            returncode: 0,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.returncode == 0
    }

    /// `cat-file` output is raw object content rather than a log.
    pub fn is_cat_file(&self) -> bool {
        self.command.as_deref() == Some("cat-file")
    }

    /// Stdout followed by stderr.
    pub fn combined_output(&self) -> Vec<u8> {
        let mut out = self.stdout.clone();
        out.extend_from_slice(&self.stderr);
        out
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    fn fail(mut self, returncode: i32, message: impl Into<Vec<u8>>) -> Self {
        self.returncode = returncode;
        self.stdout.clear();
        self.stderr = message.into();
        self
    }
}

/// Internal failure modes, folded into a [`GitInvocation`] before returning.
#[derive(Debug, Error)]
pub(crate) enum BridgeError {
    #[error("Command not supported: git {0}")]
    CommandNotSupported(String),

    #[error("Git is disabled")]
    Disabled,

    #[error("{source}")]
    ProcessSpawnFailed {
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    MissingArguments(&'static str),

    #[error("git command timed out")]
    TimedOut,

    #[error(transparent)]
    Vfs(#[from] VfsError),
}

impl BridgeError {
    fn returncode(&self) -> i32 {
        match self {
            BridgeError::ProcessSpawnFailed { source } => source.raw_os_error().unwrap_or(1),
            BridgeError::TimedOut => TIMEOUT_RETURN_CODE,
            BridgeError::Vfs(e) => e.raw_os_error().unwrap_or(1),
            _ => 1,
        }
    }
}
