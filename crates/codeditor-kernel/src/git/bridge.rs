use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{BridgeError, GitIdentity, GitInvocation, LOCAL_COMMANDS, SUPPORTED_GIT_COMMANDS};
use super::{bootstrap, local};
use crate::config::GitConfig;
use crate::vfs::RootFs;

/// Captured result of a command, before it becomes a [`GitInvocation`].
#[derive(Debug, Default)]
pub(crate) struct ProcessOutput {
    pub returncode: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    fn stdout(text: String) -> Self {
        Self {
            returncode: 0,
            stdout: text.into_bytes(),
            stderr: Vec::new(),
        }
    }
}

/// Runs git and local pseudo-commands against one working tree.
///
/// Clones share the serialization lock, so at most one command of any kind
/// runs at a time across all of them.
#[derive(Debug, Clone)]
pub struct GitBridge {
    config: GitConfig,
    fs: Arc<RootFs>,
    workdir: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl GitBridge {
    /// A bridge running git in `workdir`, the native directory behind the
    /// default mount of `fs`.
    pub fn new(config: GitConfig, fs: Arc<RootFs>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            fs,
            workdir: workdir.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn config(&self) -> &GitConfig {
        &self.config
    }

    pub fn fs(&self) -> &Arc<RootFs> {
        &self.fs
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Run one command. Never fails: errors are reported in the result.
    #[tracing::instrument(skip(self, identity), fields(command = argv.first().map(String::as_str).unwrap_or("")))]
    pub async fn run(&self, argv: &[String], identity: &GitIdentity) -> GitInvocation {
        let _guard = self.lock.lock().await;
        info!(args = %argv.join(" "), "git");

        bootstrap::ensure_repository(self, identity).await;

        let invocation = GitInvocation::new(argv);
        match self.dispatch(argv, identity).await {
            Ok(output) => GitInvocation {
                returncode: output.returncode,
                stdout: output.stdout,
                stderr: output.stderr,
                ..invocation
            },
            Err(e) => {
                debug!(error = %e, "git command failed");
                invocation.fail(e.returncode(), e.to_string())
            }
        }
    }

    /// Convenience for string slices.
    pub async fn run_args(&self, argv: &[&str], identity: &GitIdentity) -> GitInvocation {
        let argv: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
        self.run(&argv, identity).await
    }

    async fn dispatch(
        &self,
        argv: &[String],
        identity: &GitIdentity,
    ) -> Result<ProcessOutput, BridgeError> {
        let verb = argv.first().map(String::as_str).unwrap_or("");

        if LOCAL_COMMANDS.contains(&verb) {
            debug!(verb, "local command");
            return local::run(&self.fs, verb, argv).await.map(ProcessOutput::stdout);
        }
        if !SUPPORTED_GIT_COMMANDS.contains(&verb) {
            return Err(BridgeError::CommandNotSupported(argv.join(" ")));
        }

        let mut args = self.config.default_args.clone();
        args.extend(argv.iter().cloned());
        self.call(&args, identity).await
    }

    /// Spawn git with `args` and wait for it. Caller must hold the lock.
    pub(crate) async fn call(
        &self,
        args: &[String],
        identity: &GitIdentity,
    ) -> Result<ProcessOutput, BridgeError> {
        if !self.config.enabled {
            return Err(BridgeError::Disabled);
        }

        let mut cmd = Command::new(&self.config.cmd);
        cmd.args(args)
            .current_dir(&self.workdir)
            .envs(self.environment(identity))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|source| BridgeError::ProcessSpawnFailed { source })?;

        let wait = child.wait_with_output();
        let output = match self.config.timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), wait)
                .await
                .map_err(|_| BridgeError::TimedOut)?,
            None => wait.await,
        }
        .map_err(|source| BridgeError::ProcessSpawnFailed { source })?;

        Ok(ProcessOutput {
            returncode: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    /// Variables added on top of the inherited environment.
    fn environment(&self, identity: &GitIdentity) -> Vec<(&'static str, String)> {
        let mut env = vec![
            ("GIT_TERMINAL_PROMPT", "0".to_string()),
            ("GIT_PAGER", "cat".to_string()),
            ("GIT_EDITOR", "true".to_string()),
        ];
        let name = non_empty(&self.config.author_name).or_else(|| non_empty(&identity.name));
        if let Some(name) = name {
            env.push(("GIT_AUTHOR_NAME", name.clone()));
            env.push(("GIT_COMMITTER_NAME", name));
        }
        let email = non_empty(&self.config.author_email).or_else(|| non_empty(&identity.email));
        if let Some(email) = email {
            env.push(("GIT_AUTHOR_EMAIL", email.clone()));
            env.push(("GIT_COMMITTER_EMAIL", email));
        }
        env
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryBackend;

    fn bridge(config: GitConfig) -> GitBridge {
        let fs = Arc::new(RootFs::new(Arc::new(MemoryBackend::new())));
        GitBridge::new(config, fs, std::env::temp_dir())
    }

    fn lookup<'a>(env: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        env.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn config_identity_overrides_caller() {
        let config = GitConfig {
            author_name: Some("Ops Bot".into()),
            ..GitConfig::default()
        };
        let b = bridge(config);
        let env = b.environment(&GitIdentity::new("Jo Doe", "jo@example.com"));
        assert_eq!(lookup(&env, "GIT_AUTHOR_NAME"), Some("Ops Bot"));
        assert_eq!(lookup(&env, "GIT_COMMITTER_NAME"), Some("Ops Bot"));
        assert_eq!(lookup(&env, "GIT_AUTHOR_EMAIL"), Some("jo@example.com"));
        assert_eq!(lookup(&env, "GIT_TERMINAL_PROMPT"), Some("0"));
    }

    #[test]
    fn anonymous_caller_sets_no_author() {
        let b = bridge(GitConfig::default());
        let env = b.environment(&GitIdentity::default());
        assert_eq!(lookup(&env, "GIT_AUTHOR_NAME"), None);
        assert_eq!(lookup(&env, "GIT_AUTHOR_EMAIL"), None);
        assert_eq!(lookup(&env, "GIT_PAGER"), Some("cat"));
    }

    #[tokio::test]
    async fn unsupported_verb_is_refused() {
        let config = GitConfig {
            init_repo: false,
            ..GitConfig::default()
        };
        let inv = bridge(config).run_args(&["gc", "--aggressive"], &GitIdentity::default()).await;
        assert_eq!(inv.returncode, 1);
        assert_eq!(inv.stderr_text(), "Command not supported: git gc --aggressive");
        assert!(inv.stdout.is_empty());
    }

    #[tokio::test]
    async fn disabled_git_still_serves_local_commands() {
        let config = GitConfig {
            enabled: false,
            ..GitConfig::default()
        };
        let b = bridge(config);
        let inv = b.run_args(&["status"], &GitIdentity::default()).await;
        assert_eq!(inv.returncode, 1);
        assert_eq!(inv.stderr_text(), "Git is disabled");

        let inv = b.run_args(&["mounts"], &GitIdentity::default()).await;
        assert!(inv.is_success());
        assert_eq!(inv.stdout_text(), "");
    }

    #[tokio::test]
    async fn missing_executable_reports_os_error() {
        let config = GitConfig {
            cmd: "/nonexistent/bin/git-not-here".into(),
            init_repo: false,
            ..GitConfig::default()
        };
        let inv = bridge(config).run_args(&["status"], &GitIdentity::default()).await;
        assert_ne!(inv.returncode, 0);
        assert!(!inv.stderr.is_empty());
        assert_eq!(inv.command.as_deref(), Some("status"));
    }
}
