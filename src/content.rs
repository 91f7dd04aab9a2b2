//! Content hierarchy snapshot types.
//!
//! A project's navigable structure is a tree of [`ContentNode`]s; each node
//! points at one content record by reference. The digest index maps those
//! references to the current digest of the record's bytes. Both are
//! read-only snapshots handed over by the content source.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Item id addressing the whole hierarchy instead of a single subtree.
pub const WHOLE_HIERARCHY: &str = "all";

/// Per-project lookup from content reference to content digest.
pub type DigestIndex = HashMap<String, String>;

/// A node in a project's content hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentNode {
    /// Hierarchy item id (addressable for rendering and invalidation)
    pub id: String,

    /// Reference to the content record this node displays
    pub content_ref: String,

    /// Child items, in display order
    #[serde(default)]
    pub children: Vec<ContentNode>,
}

impl ContentNode {
    /// Create a leaf node.
    pub fn new(id: &str, content_ref: &str) -> Self {
        Self {
            id: id.to_string(),
            content_ref: content_ref.to_string(),
            children: Vec::new(),
        }
    }

    /// Create a node with children.
    pub fn with_children(id: &str, content_ref: &str, children: Vec<ContentNode>) -> Self {
        Self {
            id: id.to_string(),
            content_ref: content_ref.to_string(),
            children,
        }
    }

    /// Find the node with the given id in this subtree (depth-first).
    pub fn find(&self, id: &str) -> Option<&ContentNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Collect the content references of this node and every descendant in
    /// walk order, keeping only the first occurrence of each reference.
    /// Several items may display the same record; its bytes count once.
    pub fn collect_refs(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut refs = Vec::new();
        self.collect_refs_into(&mut seen, &mut refs);
        refs
    }

    fn collect_refs_into(&self, seen: &mut HashSet<String>, refs: &mut Vec<String>) {
        if seen.insert(self.content_ref.clone()) {
            refs.push(self.content_ref.clone());
        }
        for child in &self.children {
            child.collect_refs_into(seen, refs);
        }
    }

    /// Total number of nodes in this subtree.
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(ContentNode::node_count)
            .sum::<usize>()
    }
}
