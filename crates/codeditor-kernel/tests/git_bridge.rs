//! Git bridge integration tests.
//!
//! Most tests swap the git executable for a small shell script so they run
//! without git installed. The last one drives a real repository bootstrap
//! and is skipped when `git` is not on the PATH.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use codeditor_kernel::{
    CodeEditor, EditorConfig, GitBridge, GitConfig, GitIdentity, LocalBackend, RootFs,
};
use tempfile::TempDir;

// ============================================================================
// Shared test setup
// ============================================================================

/// Write an executable script into `dir` and return its path.
fn fake_git(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-git");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn test_config(cmd: &Path) -> GitConfig {
    GitConfig {
        cmd: cmd.display().to_string(),
        init_repo: false,
        ..GitConfig::default()
    }
}

fn bridge_in(workdir: &Path, config: GitConfig) -> GitBridge {
    let fs = RootFs::new(Arc::new(LocalBackend::new(workdir)));
    GitBridge::new(config, Arc::new(fs), workdir)
}

fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Pass-through
// ============================================================================

#[tokio::test]
async fn pass_through_gets_default_args_env_and_exit_code() {
    let bin = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let git = fake_git(
        bin.path(),
        r#"echo "args: $*"
echo "author: $GIT_AUTHOR_NAME <$GIT_COMMITTER_EMAIL>"
echo "pwd: $(pwd)"
echo "oops" >&2
exit 3"#,
    );
    let b = bridge_in(work.path(), test_config(&git));

    let inv = b
        .run(&argv(&["log", "--oneline"]), &GitIdentity::new("Jo Doe", "jo@example.com"))
        .await;

    assert_eq!(inv.returncode, 3);
    assert_eq!(inv.command.as_deref(), Some("log"));
    let out = inv.stdout_text();
    assert!(out.contains("args: -c color.ui=true log --oneline"), "{out}");
    assert!(out.contains("author: Jo Doe <jo@example.com>"), "{out}");
    let workdir = dunce::canonicalize(work.path()).unwrap();
    assert!(out.contains(&format!("pwd: {}", workdir.display())), "{out}");
    assert_eq!(inv.stderr_text(), "oops\n");
    assert!(inv.combined_output().ends_with(b"oops\n"));
}

#[tokio::test]
async fn unsupported_verbs_never_spawn() {
    let bin = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let marker = work.path().join("spawned");
    let git = fake_git(bin.path(), &format!("touch '{}'", marker.display()));
    let b = bridge_in(work.path(), test_config(&git));

    let inv = b.run(&argv(&["config", "--global", "user.name", "x"]), &GitIdentity::default()).await;
    assert_eq!(inv.returncode, 1);
    assert!(inv.stderr_text().contains("Command not supported"));
    assert!(!marker.exists());

    let inv = b.run(&[], &GitIdentity::default()).await;
    assert_eq!(inv.returncode, 1);
    assert_eq!(inv.command, None);
}

#[tokio::test]
async fn cat_file_output_is_raw() {
    let bin = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let git = fake_git(bin.path(), r#"printf 'blob\000bytes'"#);
    let b = bridge_in(work.path(), test_config(&git));

    let inv = b.run(&argv(&["cat-file", "-p", "abc123"]), &GitIdentity::default()).await;
    assert!(inv.is_success());
    assert!(inv.is_cat_file());
    assert_eq!(inv.stdout, b"blob\0bytes");
}

// ============================================================================
// Serialization and timeouts
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_commands_are_serialized() {
    let bin = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let git = fake_git(bin.path(), "echo start; sleep 0.3; echo end");
    let a = bridge_in(work.path(), test_config(&git));
    let b = a.clone();

    let started = Instant::now();
    let (x, y) = tokio::join!(
        tokio::spawn(async move { a.run(&argv(&["status"]), &GitIdentity::default()).await }),
        tokio::spawn(async move { b.run(&argv(&["status"]), &GitIdentity::default()).await }),
    );
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(600), "ran in parallel: {elapsed:?}");
    for inv in [x.unwrap(), y.unwrap()] {
        assert_eq!(inv.stdout_text(), "start\nend\n");
    }
}

#[tokio::test]
async fn slow_commands_time_out_and_release_the_lock() {
    let bin = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let git = fake_git(bin.path(), r#"[ "$3" = "status" ] && exec sleep 10; echo fast"#);
    let config = GitConfig {
        timeout_secs: Some(1),
        ..test_config(&git)
    };
    let b = bridge_in(work.path(), config);

    let started = Instant::now();
    let inv = b.run(&argv(&["status"]), &GitIdentity::default()).await;
    assert_eq!(inv.returncode, 124);
    assert_eq!(inv.stderr_text(), "git command timed out");
    assert!(started.elapsed() < Duration::from_secs(5));

    let inv = b.run(&argv(&["log"]), &GitIdentity::default()).await;
    assert!(inv.is_success());
    assert_eq!(inv.stdout_text(), "fast\n");
}

// ============================================================================
// Local commands through a configured editor
// ============================================================================

#[tokio::test]
async fn configured_mounts_are_listed_and_browsable() {
    let root = TempDir::new().unwrap();
    let home = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    std::fs::write(home.path().join("airflow.cfg"), "[core]\n").unwrap();
    std::fs::create_dir(logs.path().join("scheduler")).unwrap();

    let toml = format!(
        r#"
[git]
init_repo = false

[fs]
root_directory = "{}"

[mounts]
mount = "name=airflow_home,path={}"
mount_name = "logs"
mount_path = "{}"
"#,
        root.path().display(),
        home.path().display(),
        logs.path().display(),
    );
    let config = EditorConfig::from_toml_str(&toml).unwrap();
    let editor = CodeEditor::open(config).await.unwrap();

    let inv = editor.run_git_command(&argv(&["mounts"]), &GitIdentity::default()).await;
    assert!(inv.is_success());
    assert_eq!(inv.stdout_text(), "airflow_home\nlogs");
    assert_eq!(editor.mount_list(), vec!["airflow_home", "logs"]);

    let inv = editor
        .run_git_command(&argv(&["ls-local", "-l", "/~airflow_home"]), &GitIdentity::default())
        .await;
    assert!(inv.is_success(), "{}", inv.stderr_text());
    let out = inv.stdout_text();
    assert!(out.contains(" blob /~airflow_home/airflow.cfg#"), "{out}");
    assert!(out.ends_with("       7\tairflow.cfg"), "{out}");

    let inv = editor
        .run_git_command(&argv(&["ls-local", "~logs"]), &GitIdentity::default())
        .await;
    assert!(inv.stdout_text().starts_with("040"));
    assert!(inv.stdout_text().ends_with(" tree /~logs/scheduler\tscheduler"));

    let inv = editor
        .run_git_command(&argv(&["mv-local", "/~airflow_home/airflow.cfg", "/~logs"]), &GitIdentity::default())
        .await;
    assert!(inv.is_success(), "{}", inv.stderr_text());
    assert!(logs.path().join("airflow.cfg").exists());
    assert!(!home.path().join("airflow.cfg").exists());

    let inv = editor
        .run_git_command(&argv(&["rm-local", "/~logs/missing.txt"]), &GitIdentity::default())
        .await;
    assert_ne!(inv.returncode, 0);
    assert!(inv.stderr_text().contains("not found"));
}

// ============================================================================
// Repository bootstrap
// ============================================================================

#[tokio::test]
async fn bootstrap_runs_once_before_the_first_command() {
    let bin = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let log = bin.path().join("calls.log");
    let git = fake_git(
        bin.path(),
        &format!(
            r#"echo "$*" >> '{log}'
case "$1" in
  config) echo trunk ;;
  init) mkdir -p .git ;;
esac"#,
            log = log.display()
        ),
    );
    let config = GitConfig {
        init_repo: true,
        ..test_config(&git)
    };
    let b = bridge_in(work.path(), config);

    assert!(b.run(&argv(&["status"]), &GitIdentity::default()).await.is_success());
    assert!(b.run(&argv(&["status"]), &GitIdentity::default()).await.is_success());

    let calls = std::fs::read_to_string(&log).unwrap();
    assert_eq!(
        calls.lines().collect::<Vec<_>>(),
        vec![
            "config --global init.defaultBranch",
            "init -b trunk .",
            "add .gitignore",
            "commit -m Initial commit",
            "-c color.ui=true status",
            "-c color.ui=true status",
        ]
    );
    let gitignore = std::fs::read_to_string(work.path().join(".gitignore")).unwrap();
    assert_eq!(gitignore, "__pycache__\n");
}

#[tokio::test]
async fn bootstrap_keeps_an_existing_gitignore() {
    let bin = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    std::fs::write(work.path().join(".gitignore"), "*.log\n").unwrap();
    let log = bin.path().join("calls.log");
    let git = fake_git(
        bin.path(),
        &format!(
            r#"echo "$1" >> '{log}'
[ "$1" = config ] && exit 1
[ "$1" = init ] && mkdir -p .git
exit 0"#,
            log = log.display()
        ),
    );
    let config = GitConfig {
        init_repo: true,
        ..test_config(&git)
    };
    let b = bridge_in(work.path(), config);
    b.run(&argv(&["tag"]), &GitIdentity::default()).await;

    let calls = std::fs::read_to_string(&log).unwrap();
    assert_eq!(calls.lines().collect::<Vec<_>>(), vec!["config", "init", "commit", "-c"]);
    assert_eq!(std::fs::read_to_string(work.path().join(".gitignore")).unwrap(), "*.log\n");
}

#[tokio::test]
async fn bootstrap_with_real_git() {
    let available = std::process::Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success());
    if !available {
        eprintln!("git not available, skipping");
        return;
    }

    let work = TempDir::new().unwrap();
    std::fs::write(work.path().join("etl.py"), "print('hi')\n").unwrap();
    let b = bridge_in(work.path(), GitConfig::default());
    let who = GitIdentity::new("Test User", "test@example.com");

    let inv = b.run(&argv(&["log", "--format=%s|%an"]), &who).await;
    assert!(inv.is_success(), "{}", inv.stderr_text());
    assert_eq!(inv.stdout_text().trim(), "Initial commit|Test User");
    assert!(work.path().join(".git").is_dir());

    let inv = b.run(&argv(&["status", "--porcelain"]), &who).await;
    assert_eq!(inv.stdout_text(), "?? etl.py\n");

    let inv = b.run(&argv(&["ls-local", "-a"]), &who).await;
    let out = inv.stdout_text();
    assert!(out.contains(" tree /.git\t.git"), "{out}");
    assert!(out.contains(" blob /.gitignore\t.gitignore"), "{out}");
}
