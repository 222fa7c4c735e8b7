//! First-use repository initialization.

use tracing::{info, warn};

use super::bridge::GitBridge;
use super::{DEFAULT_GIT_BRANCH, GitIdentity};

const DEFAULT_GITIGNORE: &str = "__pycache__\n";

/// Initialize a repository in the working directory if there is none.
///
/// Best effort: failures are logged and the triggering command still runs.
/// Caller must hold the bridge lock.
pub(super) async fn ensure_repository(bridge: &GitBridge, identity: &GitIdentity) {
    if !bridge.is_enabled() || !bridge.config().init_repo {
        return;
    }
    let workdir = bridge.workdir();
    if tokio::fs::try_exists(workdir.join(".git")).await.unwrap_or(false) {
        return;
    }
    info!(workdir = %workdir.display(), "initializing git repository");

    let branch = default_branch(bridge, identity).await;
    step(bridge, identity, &["init", "-b", &branch, "."]).await;

    let gitignore = workdir.join(".gitignore");
    if !tokio::fs::try_exists(&gitignore).await.unwrap_or(false) {
        match tokio::fs::write(&gitignore, DEFAULT_GITIGNORE).await {
            Ok(()) => step(bridge, identity, &["add", ".gitignore"]).await,
            Err(e) => warn!(error = %e, "failed to write .gitignore"),
        }
    }
    step(bridge, identity, &["commit", "-m", "Initial commit"]).await;
}

/// `init.defaultBranch` from the global git config, or `main`.
async fn default_branch(bridge: &GitBridge, identity: &GitIdentity) -> String {
    let args = owned(&["config", "--global", "init.defaultBranch"]);
    match bridge.call(&args, identity).await {
        Ok(output) => {
            let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if output.returncode == 0 && !branch.is_empty() {
                branch
            } else {
                DEFAULT_GIT_BRANCH.to_string()
            }
        }
        Err(_) => DEFAULT_GIT_BRANCH.to_string(),
    }
}

async fn step(bridge: &GitBridge, identity: &GitIdentity, args: &[&str]) {
    match bridge.call(&owned(args), identity).await {
        Ok(output) if output.returncode == 0 => {}
        Ok(output) => warn!(
            args = %args.join(" "),
            returncode = output.returncode,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "repository bootstrap step failed"
        ),
        Err(e) => warn!(args = %args.join(" "), error = %e, "repository bootstrap step failed"),
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}
