//! Navigation tree for the file browser sidebar.
//!
//! A closed set of node kinds. [`get_tree`] dispatches on the first segment
//! of a tree path (`files/dags`, `tags`, ...) and returns that node's
//! children.

use serde::Serialize;

use crate::git::{GitBridge, GitIdentity};
use crate::vfs::{RootFs, VfsResult, normalize};

/// Top-level node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TreeNode {
    Root,
    Files,
    GitWorkspace,
    Tags,
    LocalBranches,
    RemoteBranches,
}

impl TreeNode {
    pub const ALL: [TreeNode; 6] = [
        TreeNode::Root,
        TreeNode::Files,
        TreeNode::GitWorkspace,
        TreeNode::Tags,
        TreeNode::LocalBranches,
        TreeNode::RemoteBranches,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            TreeNode::Root => "",
            TreeNode::Files => "files",
            TreeNode::GitWorkspace => "workspace",
            TreeNode::Tags => "tags",
            TreeNode::LocalBranches => "local-branches",
            TreeNode::RemoteBranches => "remote-branches",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TreeNode::Root => "Root",
            TreeNode::Files => "Files",
            TreeNode::GitWorkspace => "Git Workspace",
            TreeNode::Tags => "Tags",
            TreeNode::LocalBranches => "Local Branches",
            TreeNode::RemoteBranches => "Remote Branches",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            TreeNode::Root => "fa-sitemap",
            TreeNode::Files => "fa-home",
            TreeNode::GitWorkspace => "fa-briefcase",
            TreeNode::Tags => "fa-tags",
            TreeNode::LocalBranches => "fa-code-fork",
            TreeNode::RemoteBranches => "fa-globe",
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::GitWorkspace)
    }

    /// Git nodes disappear when git is switched off.
    pub fn enabled(&self, git_enabled: bool) -> bool {
        match self {
            TreeNode::Root | TreeNode::Files => true,
            _ => git_enabled,
        }
    }

    pub fn from_id(id: &str) -> Option<TreeNode> {
        TreeNode::ALL.into_iter().find(|n| n.id() == id)
    }

    fn item(&self) -> TreeItem {
        TreeItem {
            id: self.id().to_string(),
            label: Some(self.label().to_string()),
            leaf: self.is_leaf(),
            icon: self.icon(),
        }
    }

    /// Children of this node. `path` is the rest of the tree path.
    pub async fn children(&self, bridge: &GitBridge, path: &str) -> VfsResult<Vec<TreeItem>> {
        let identity = GitIdentity::default();
        let items = match self {
            TreeNode::Root => root_children(bridge),
            TreeNode::Files => files_children(bridge.fs(), path).await?,
            TreeNode::GitWorkspace => Vec::new(),
            TreeNode::Tags => {
                let out = git_lines(bridge, &["tag"], &identity).await;
                out.iter().map(|l| TreeItem::leaf(l.trim(), self.icon())).collect()
            }
            TreeNode::LocalBranches => {
                let out = git_lines(bridge, &["branch"], &identity).await;
                out.iter()
                    .map(|l| TreeItem::leaf(branch_name(l), self.icon()))
                    .collect()
            }
            TreeNode::RemoteBranches => {
                let out = git_lines(bridge, &["branch", "--remotes"], &identity).await;
                out.iter()
                    .map(|l| TreeItem::leaf(branch_name(l.split("->").next().unwrap_or("")), self.icon()))
                    .collect()
            }
        };
        Ok(items)
    }
}

/// One row in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeItem {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub leaf: bool,
    pub icon: &'static str,
}

impl TreeItem {
    fn leaf(id: &str, icon: &'static str) -> Self {
        Self {
            id: id.to_string(),
            label: None,
            leaf: true,
            icon,
        }
    }
}

/// Children of the node addressed by `path`.
///
/// An empty path is the root. Unknown node ids yield nothing.
pub async fn get_tree(bridge: &GitBridge, path: Option<&str>) -> VfsResult<Vec<TreeItem>> {
    let path = path.unwrap_or("");
    let (head, rest) = path.split_once('/').unwrap_or((path, ""));
    let node = if head.is_empty() {
        TreeNode::Root
    } else {
        match TreeNode::from_id(head) {
            Some(TreeNode::Root) | None => return Ok(Vec::new()),
            Some(node) => node,
        }
    };
    if !node.enabled(bridge.is_enabled()) {
        return Ok(Vec::new());
    }
    node.children(bridge, &normalize(Some(rest))).await
}

fn root_children(bridge: &GitBridge) -> Vec<TreeItem> {
    let mut items = vec![TreeNode::Files.item()];
    let mut mounts: Vec<_> = bridge.fs().mounts().into_iter().filter(|m| !m.is_default).collect();
    mounts.sort_by(|a, b| a.name.cmp(&b.name));
    for mount in mounts {
        items.push(TreeItem {
            id: format!("files{}", mount.prefix),
            label: Some(mount.name),
            leaf: false,
            icon: "fa-folder",
        });
    }
    items.extend(
        [
            TreeNode::GitWorkspace,
            TreeNode::Tags,
            TreeNode::LocalBranches,
            TreeNode::RemoteBranches,
        ]
        .iter()
        .filter(|n| n.enabled(bridge.is_enabled()))
        .map(TreeNode::item),
    );
    items
}

async fn files_children(fs: &RootFs, path: &str) -> VfsResult<Vec<TreeItem>> {
    let mut items = Vec::new();
    for entry in fs.list_children(path, false).await? {
        let leaf = !entry.kind.is_dir();
        items.push(TreeItem {
            id: entry.name,
            label: None,
            leaf,
            icon: if leaf { "fa-file" } else { "fa-folder" },
        });
    }
    Ok(items)
}

/// Non-empty stdout lines of a successful git call; nothing on failure.
async fn git_lines(bridge: &GitBridge, args: &[&str], identity: &GitIdentity) -> Vec<String> {
    let inv = bridge.run_args(args, identity).await;
    if !inv.is_success() {
        return Vec::new();
    }
    inv.stdout_text()
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect()
}

fn branch_name(line: &str) -> &str {
    let name = line.trim();
    name.strip_prefix('*').map_or(name, str::trim)
}
