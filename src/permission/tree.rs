//! Permission flags, nodes, and trees.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A named permission grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionFlag {
    /// Read access to content within the scope
    View,
    /// Modify content within the scope
    Edit,
    /// Move content through the publishing workflow
    Publish,
    /// Every permission, including view
    All,
}

impl fmt::Display for PermissionFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PermissionFlag::View => "view",
            PermissionFlag::Edit => "edit",
            PermissionFlag::Publish => "publish",
            PermissionFlag::All => "all",
        };
        write!(f, "{}", name)
    }
}

/// Flags granted on one resource path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionNode {
    /// Resource path the grant applies to (e.g. "project:42/chapter-1")
    pub path: String,

    /// Flags granted on that path
    pub flags: BTreeSet<PermissionFlag>,
}

impl PermissionNode {
    /// Create a node from a path and its granted flags.
    pub fn new(path: &str, flags: impl IntoIterator<Item = PermissionFlag>) -> Self {
        Self {
            path: path.to_string(),
            flags: flags.into_iter().collect(),
        }
    }

    /// True if this node grants the flag, directly or via `all`.
    pub fn grants(&self, flag: PermissionFlag) -> bool {
        self.flags.contains(&flag) || self.flags.contains(&PermissionFlag::All)
    }
}

/// The effective permissions of one user within one scope.
///
/// Trees are replaced wholesale on refresh and never mutated, so the cache
/// hands them out as `Arc<PermissionTree>` clones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionTree {
    nodes: Vec<PermissionNode>,
}

impl PermissionTree {
    /// Create a tree from its nodes.
    pub fn new(nodes: Vec<PermissionNode>) -> Self {
        Self { nodes }
    }

    /// A tree with no grants at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True if the tree carries no permission nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of permission nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// The permission nodes, in fetch order.
    pub fn nodes(&self) -> &[PermissionNode] {
        &self.nodes
    }

    /// True if any node grants view access (directly or via `all`).
    /// This is the gate for serving any content in the scope.
    pub fn has_view(&self) -> bool {
        self.grants_anywhere(PermissionFlag::View)
    }

    /// True if any node grants the flag.
    pub fn grants_anywhere(&self, flag: PermissionFlag) -> bool {
        self.nodes.iter().any(|node| node.grants(flag))
    }

    /// True if the node for the given path grants the flag.
    pub fn grants_on(&self, path: &str, flag: PermissionFlag) -> bool {
        self.nodes
            .iter()
            .filter(|node| node.path == path)
            .any(|node| node.grants(flag))
    }
}
