//! Remote category trees and import priorities.
//!
//! Categories are imported parents first: each node is scheduled at
//! `base_priority + depth`, lower priorities running earlier.
//!
//! ```text
//! 1            priority 10
//! ├── 2        priority 11
//! └── 3        priority 11
//!     └── 4    priority 12
//! ```
//!
//! Priority only reduces redundant recursive imports; the import of a
//! child still imports a missing parent itself.

use crate::types::RemoteId;
use std::collections::BTreeSet;

/// Default base priority of category imports.
pub const DEFAULT_BASE_PRIORITY: u32 = 10;

/// A node of a remote category tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// Remote id of the category.
    pub id: RemoteId,
    /// Children in remote order.
    pub children: CategoryTree,
}

/// An ordered forest of remote categories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryTree {
    nodes: Vec<TreeNode>,
}

impl CategoryTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a root node with its subtree.
    pub fn with_node(mut self, id: impl Into<RemoteId>, children: CategoryTree) -> Self {
        self.nodes.push(TreeNode {
            id: id.into(),
            children,
        });
        self
    }

    /// Adds a leaf.
    pub fn with_leaf(self, id: impl Into<RemoteId>) -> Self {
        self.with_node(id, CategoryTree::new())
    }

    /// Top-level nodes.
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Returns true if the tree has no node.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of nodes in the whole tree.
    pub fn len(&self) -> usize {
        self.nodes.iter().map(|n| 1 + n.children.len()).sum()
    }

    /// Depth-first walk yielding `(id, depth)`, parents before children.
    pub fn walk(&self) -> Vec<(&RemoteId, u32)> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack: Vec<(&TreeNode, u32)> = self.nodes.iter().rev().map(|n| (n, 0)).collect();
        while let Some((node, depth)) = stack.pop() {
            out.push((&node.id, depth));
            stack.extend(node.children.nodes.iter().rev().map(|c| (c, depth + 1)));
        }
        out
    }

    /// Plans the import of the tree.
    ///
    /// Every node of `changed` (every node when `None`) is scheduled at
    /// `base_priority + depth`. The walk always descends below unchanged
    /// nodes.
    pub fn plan(&self, base_priority: u32, changed: Option<&BTreeSet<RemoteId>>) -> Vec<(RemoteId, u32)> {
        self.walk()
            .into_iter()
            .filter(|(id, _)| changed.map_or(true, |c| c.contains(*id)))
            .map(|(id, depth)| (id.clone(), base_priority.saturating_add(depth)))
            .collect()
    }
}
