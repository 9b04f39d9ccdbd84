//! Reference Tree Data Structures
//!
//! A `ReferenceTree` is the output of the tree builder: one `ReferenceNode` per
//! *occurrence* of an entity, so the same entity can sit at several positions.
//! Nodes are addressed by their path-based `key`, never by entity id.
//!
//! The tree also carries the aggregate statistics gathered during traversal and
//! the entity-keyed selection state used for bulk actions.

use crate::models::{Entity, EntityType, SelectionState, VisitedPath};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Key of the root node
pub const ROOT_KEY: &str = "0";

/// One occurrence of an entity in the tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceNode {
    /// Path-based identifier, unique within the tree
    pub key: String,

    /// The referenced entity, or an unresolved `Link` placeholder
    pub entity: Arc<Entity>,

    /// Depth from the root (root = 1)
    pub level: usize,

    #[serde(rename = "type")]
    pub node_type: EntityType,

    /// False for unresolved links and non-linkable entity types
    pub is_resolved: bool,

    /// True when the entity already appears higher up on this node's path
    pub is_circular: bool,

    /// Children in traversal order
    pub children: Vec<ReferenceNode>,
}

impl ReferenceNode {
    pub fn id(&self) -> &str {
        self.entity.id()
    }

    pub fn selection_key(&self) -> String {
        self.entity.selection_key()
    }

    /// Preorder iterator over this node and its descendants
    pub fn iter(&self) -> Nodes<'_> {
        Nodes { stack: vec![self] }
    }

    /// Number of nodes below this one
    pub fn descendant_count(&self) -> usize {
        self.iter().count() - 1
    }

    /// Deepest level reached in this subtree
    pub fn max_level(&self) -> usize {
        self.iter().map(|node| node.level).max().unwrap_or(self.level)
    }
}

/// Depth-first, preorder traversal over a subtree
pub struct Nodes<'a> {
    stack: Vec<&'a ReferenceNode>,
}

impl<'a> Iterator for Nodes<'a> {
    type Item = &'a ReferenceNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Aggregates collected while building a tree
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeStats {
    /// Level → number of reference nodes at that level (root not counted)
    pub references_per_level: BTreeMap<usize, usize>,

    /// All reference nodes below the root
    pub total_references: usize,

    /// Distinct entities below the root, keyed by `"<id>-<type>"`
    pub unique_entities: usize,

    /// Deepest level reached
    pub max_depth: usize,

    /// Some branch goes deeper than the configured max level
    pub exceeds_max_level: bool,

    /// Traversal stopped at the failsafe depth somewhere
    pub hit_failsafe: bool,
}

/// Result of `build_tree_of_references`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceTree {
    pub root: ReferenceNode,
    pub stats: TreeStats,
    pub selection: SelectionState,

    /// Level at which rendering collapses deeper references
    pub max_level: usize,

    #[serde(skip)]
    pub(crate) visited: HashMap<String, VisitedPath>,
}

impl ReferenceTree {
    /// Every node of the tree, root first, depth-first
    pub fn nodes(&self) -> Nodes<'_> {
        self.root.iter()
    }

    /// Look up a node by its path key
    pub fn find(&self, key: &str) -> Option<&ReferenceNode> {
        self.nodes().find(|node| node.key == key)
    }

    /// All occurrences of an entity id, in traversal order
    pub fn occurrences<'a>(&'a self, entity_id: &'a str) -> impl Iterator<Item = &'a ReferenceNode> {
        self.nodes().filter(move |node| node.id() == entity_id)
    }

    /// Entity ids visited from the root down to `key` (inclusive)
    pub fn visited_ids(&self, key: &str) -> Option<Vec<&str>> {
        self.visited.get(key).map(VisitedPath::ids)
    }

    pub fn is_selected(&self, node: &ReferenceNode) -> bool {
        self.selection.is_selected(&node.selection_key())
    }

    /// Flip the selection of the entity at `key`
    ///
    /// Selection is keyed by entity, so every occurrence of the entity changes
    /// together. Returns the new state, or `None` when the key is unknown or the
    /// node is not selectable.
    pub fn toggle(&mut self, key: &str) -> Option<bool> {
        let selection_key = self
            .find(key)
            .filter(|node| node.is_resolved)
            .map(ReferenceNode::selection_key)?;
        Some(self.selection.toggle(&selection_key))
    }

    /// Select or deselect every selectable entity
    pub fn set_all_selected(&mut self, selected: bool) {
        let keys: Vec<String> = self
            .nodes()
            .filter(|node| node.is_resolved)
            .map(ReferenceNode::selection_key)
            .collect();
        for key in keys {
            self.selection.set(&key, selected);
        }
    }

    /// Distinct selected entities, in traversal order
    pub fn selected_entities(&self) -> Vec<Arc<Entity>> {
        self.selection.filter(self.nodes())
    }
}
