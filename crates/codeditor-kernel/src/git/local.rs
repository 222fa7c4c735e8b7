//! Pseudo-commands served by the virtual filesystem.

use std::time::SystemTime;

use chrono::{DateTime, Utc};

use super::{BridgeError, LOCAL_COMMANDS, SUPPORTED_GIT_COMMANDS};
use crate::vfs::RootFs;

pub(super) async fn run(fs: &RootFs, verb: &str, argv: &[String]) -> Result<String, BridgeError> {
    match verb {
        "mounts" => Ok(fs.mount_names().join("\n")),
        "ls-local" => ls_local(fs, argv).await,
        "rm-local" => rm_local(fs, argv).await,
        "mv-local" => mv_local(fs, argv).await,
        "help" => Ok(help()),
        _ => Err(BridgeError::CommandNotSupported(argv.join(" "))),
    }
}

/// `git ls-tree` shaped listing of any directory.
///
/// `-l`/`--long` adds mtime and size, `-a`/`--all` shows ignored names.
/// The path argument may carry a `#mtime` suffix from a previous listing.
async fn ls_local(fs: &RootFs, argv: &[String]) -> Result<String, BridgeError> {
    let mut long = false;
    let mut include_ignored = false;
    let args: Vec<&str> = argv
        .iter()
        .map(String::as_str)
        .filter(|arg| match *arg {
            "-l" | "--long" => {
                long = true;
                false
            }
            "-a" | "--all" => {
                include_ignored = true;
                false
            }
            _ => true,
        })
        .collect();

    let path = args.get(1).copied().unwrap_or("");
    let path = path.split_once('#').map_or(path, |(p, _)| p);

    let mut lines = Vec::new();
    for item in fs.path(path).iterate(include_ignored).await? {
        let stat = item.stat().await?;
        let mode = stat.mode_or_type();
        let kind = if stat.kind.is_dir() { "tree" } else { "blob" };
        if long {
            let mtime = stat.mtime.map_or_else(|| "-".to_string(), format_mtime);
            let size = match item.size().await {
                Ok(size) => size.to_string(),
                Err(_) => "-".to_string(),
            };
            lines.push(format!(
                "{mode:06o} {kind} {item}#{mtime} {size:>8}\t{}",
                item.name()
            ));
        } else {
            lines.push(format!("{mode:06o} {kind} {item}\t{}", item.name()));
        }
    }
    Ok(lines.join("\n"))
}

fn format_mtime(mtime: SystemTime) -> String {
    DateTime::<Utc>::from(mtime).format("%Y-%m-%dT%H:%M").to_string()
}

async fn rm_local(fs: &RootFs, argv: &[String]) -> Result<String, BridgeError> {
    for arg in argv.iter().skip(1).filter(|a| !a.is_empty()) {
        fs.path(arg).delete().await?;
    }
    Ok(String::new())
}

/// Move every source into (or onto) the last argument.
async fn mv_local(fs: &RootFs, argv: &[String]) -> Result<String, BridgeError> {
    let [_, sources @ .., target] = argv else {
        return Err(BridgeError::MissingArguments("Missing source/destination args"));
    };
    if sources.is_empty() {
        return Err(BridgeError::MissingArguments("Missing source/destination args"));
    }
    for source in sources {
        fs.path(source).move_to(target).await?;
    }
    Ok(String::new())
}

fn help() -> String {
    let mut verbs: Vec<&str> = LOCAL_COMMANDS
        .iter()
        .chain(SUPPORTED_GIT_COMMANDS)
        .copied()
        .collect();
    verbs.sort_unstable();
    verbs.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryBackend;
    use std::sync::Arc;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    async fn fixture() -> RootFs {
        let fs = RootFs::new(Arc::new(MemoryBackend::new()));
        fs.write_text("/dags/etl.py", "print(1)\n").await.unwrap();
        fs.write_text("/dags/sub/a.py", "").await.unwrap();
        fs.write_text("/dags/sub/b.py", "").await.unwrap();
        fs.write_text("/dags/.hidden", "").await.unwrap();
        fs.mount("/~logs", Arc::new(MemoryBackend::new())).unwrap();
        fs.mount("/~airflow_home", Arc::new(MemoryBackend::new())).unwrap();
        fs
    }

    #[tokio::test]
    async fn mounts_lists_sorted_names() {
        let fs = fixture().await;
        let out = run(&fs, "mounts", &args(&["mounts"])).await.unwrap();
        assert_eq!(out, "airflow_home\nlogs");
    }

    #[tokio::test]
    async fn ls_local_short_format() {
        let fs = fixture().await;
        let out = run(&fs, "ls-local", &args(&["ls-local", "dags"])).await.unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" blob /dags/etl.py\tetl.py"), "{}", lines[0]);
        assert!(lines[1].ends_with(" tree /dags/sub\tsub"), "{}", lines[1]);
        assert!(lines[0].starts_with("100"));
        assert!(lines[1].starts_with("040"));
    }

    #[tokio::test]
    async fn ls_local_long_format_and_all() {
        let fs = fixture().await;
        let out = run(&fs, "ls-local", &args(&["ls-local", "-l", "-a", "/dags#2024-01-01T00:00"]))
            .await
            .unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains(" blob /dags/.hidden#"));
        assert!(lines[1].ends_with("        9\tetl.py"), "{}", lines[1]);
        assert!(lines[2].ends_with("        2\tsub"), "{}", lines[2]);
    }

    #[tokio::test]
    async fn ls_local_root_skips_mount_points() {
        let fs = fixture().await;
        let out = run(&fs, "ls-local", &args(&["ls-local"])).await.unwrap();
        assert_eq!(out.lines().count(), 1);
        assert!(out.ends_with("\tdags"));
    }

    #[tokio::test]
    async fn rm_and_mv_local() {
        let fs = fixture().await;
        run(&fs, "mv-local", &args(&["mv-local", "/dags/sub/a.py", "/dags/sub/b.py", "/dags"]))
            .await
            .unwrap();
        assert!(fs.is_file("/dags/a.py").await);
        assert!(fs.is_file("/dags/b.py").await);

        run(&fs, "rm-local", &args(&["rm-local", "", "/dags/sub", "/dags/a.py"]))
            .await
            .unwrap();
        assert!(!fs.exists("/dags/sub").await);
        assert!(!fs.exists("/dags/a.py").await);

        let err = run(&fs, "mv-local", &args(&["mv-local", "/dags/b.py"])).await.unwrap_err();
        assert_eq!(err.to_string(), "Missing source/destination args");

        let err = run(&fs, "rm-local", &args(&["rm-local", "/nope"])).await.unwrap_err();
        assert!(matches!(err, BridgeError::Vfs(_)));
    }

    #[test]
    fn help_lists_every_verb_sorted() {
        let out = help();
        let verbs: Vec<&str> = out.lines().collect();
        assert_eq!(verbs.len(), LOCAL_COMMANDS.len() + SUPPORTED_GIT_COMMANDS.len());
        assert!(verbs.windows(2).all(|w| w[0] < w[1]));
        assert!(verbs.contains(&"ls-local"));
    }
}
