//! codeditor command-line front end.
//!
//! Usage:
//!   codeditor ls -l /dags
//!   codeditor cat /~logs/scheduler/latest.log
//!   echo 'print(1)' | codeditor write /dags/hello.py
//!   codeditor search -C 2 "import os"
//!   codeditor git status
//!
//! Configuration is read from `--config`, or from
//! `$XDG_CONFIG_HOME/codeditor/config.toml` when it exists.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codeditor_kernel::{CodeEditor, EditorConfig, FileType, GitIdentity};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Browse, edit, search and version files across mounted directories.
#[derive(Parser, Debug)]
#[command(name = "codeditor", version)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serve this directory as the root mount, overriding the config
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Print structured results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
        /// Include size and modification time
        #[arg(short, long)]
        long: bool,
        /// Show ignored names
        #[arg(short, long)]
        all: bool,
    },
    /// Print a file, or a repository object as ~git/<object>/<name>
    Cat { path: String },
    /// Replace a file with standard input
    Write {
        path: String,
        /// Store input as-is instead of normalizing line endings
        #[arg(long)]
        binary: bool,
    },
    /// Delete files or empty directories
    Rm {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Move files; the last path is the destination
    Mv {
        #[arg(num_args = 2.., required = true)]
        paths: Vec<String>,
    },
    /// List named mounts
    Mounts,
    /// Search file contents
    Search {
        query: String,
        /// Lines of context around each match
        #[arg(short = 'C', long)]
        context: Option<usize>,
    },
    /// Show a node of the navigation tree
    Tree { path: Option<String> },
    /// Run a git command through the bridge
    Git {
        /// Author name for commits
        #[arg(long)]
        author_name: Option<String>,
        /// Author email for commits
        #[arg(long)]
        author_email: Option<String>,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let path = dirs::config_dir()?.join("codeditor").join("config.toml");
        path.exists().then_some(path)
    })
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let path = config_path(cli.config);
    let mut config = EditorConfig::load_or_default(path.as_deref());
    if let Some(root) = cli.root {
        config.fs.root_directory = Some(root);
    }

    let editor = CodeEditor::open(config)
        .await
        .context("failed to open filesystem")?;
    let mut out = std::io::stdout().lock();

    match cli.command {
        Command::Ls { path, long, all } => {
            let entries = editor
                .list_directory(&path, long, all)
                .await
                .with_context(|| format!("cannot list {path}"))?;
            if cli.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&entries)?)?;
            } else {
                for entry in entries {
                    let kind = if entry.kind == FileType::Directory { "tree" } else { "blob" };
                    match entry.size {
                        Some(size) => {
                            writeln!(out, "{:06o} {kind} {size:>8}\t{}", entry.mode, entry.name)?
                        }
                        None => writeln!(out, "{:06o} {kind}\t{}", entry.mode, entry.name)?,
                    }
                }
            }
        }
        Command::Cat { path } => {
            let content = editor
                .read_file(&path)
                .await
                .with_context(|| format!("cannot read {path}"))?;
            out.write_all(&content.data)?;
        }
        Command::Write { path, binary } => {
            let mut data = Vec::new();
            std::io::stdin()
                .read_to_end(&mut data)
                .context("failed to read standard input")?;
            editor
                .write_file(&path, &data, !binary)
                .await
                .with_context(|| format!("cannot write {path}"))?;
        }
        Command::Rm { paths } => {
            for path in paths {
                editor
                    .delete_file(&path)
                    .await
                    .with_context(|| format!("cannot delete {path}"))?;
            }
        }
        Command::Mv { paths } => {
            let Some((target, sources)) = paths.split_last() else {
                anyhow::bail!("missing source/destination");
            };
            for source in sources {
                editor
                    .fs()
                    .path(source)
                    .move_to(target)
                    .await
                    .with_context(|| format!("cannot move {source} to {target}"))?;
            }
        }
        Command::Mounts => {
            for name in editor.mount_list() {
                writeln!(out, "{name}")?;
            }
        }
        Command::Search { query, context } => {
            let matches = editor.search(&query, context).await?;
            if cli.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&matches)?)?;
            } else {
                for m in matches {
                    if m.context_first_row == m.row_number && !m.context_text.ends_with('\n') {
                        writeln!(out, "{}:{}:{}", m.path, m.row_number, m.context_text)?;
                    } else {
                        writeln!(out, "{}:{}", m.path, m.row_number)?;
                        for (i, line) in m.context_text.lines().enumerate() {
                            writeln!(out, "{:>6}  {line}", m.context_first_row + i)?;
                        }
                    }
                }
            }
        }
        Command::Tree { path } => {
            let items = editor.tree(path.as_deref()).await?;
            if cli.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&items)?)?;
            } else {
                for item in items {
                    let marker = if item.leaf { " " } else { "+" };
                    match item.label {
                        Some(label) => writeln!(out, "{marker} {}\t{label}", item.id)?,
                        None => writeln!(out, "{marker} {}", item.id)?,
                    }
                }
            }
        }
        Command::Git {
            author_name,
            author_email,
            args,
        } => {
            let identity = GitIdentity {
                name: author_name,
                email: author_email,
            };
            let inv = editor.run_git_command(&args, &identity).await;
            out.write_all(&inv.stdout)?;
            if !inv.stdout.is_empty() && !inv.stdout.ends_with(b"\n") && !inv.is_cat_file() {
                writeln!(out)?;
            }
            std::io::stderr().write_all(&inv.stderr)?;
            out.flush()?;
            return Ok(exit_code(inv.returncode));
        }
        Command::Config => {
            writeln!(out, "{}", serde_json::to_string_pretty(editor.config())?)?;
        }
    }
    out.flush()?;
    Ok(ExitCode::SUCCESS)
}

/// Process exit status for a git return code.
fn exit_code(returncode: i32) -> ExitCode {
    match u8::try_from(returncode) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}
