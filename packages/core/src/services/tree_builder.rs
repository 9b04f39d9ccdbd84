//! Reference Tree Builder
//!
//! Builds a depth-bounded, cycle-safe tree of reference nodes from a root entity.
//!
//! # Traversal
//!
//! For each field (in payload order) and each of its locale values:
//!
//! 1. an array whose every element has a `sys` block contributes one child per element
//! 2. a rich-text document contributes its embedded `data.target` references
//! 3. an object with a `sys` block contributes one child
//! 4. anything else contributes nothing
//!
//! Every child gets the key `"{parent}-{field_index}-{occurrence}"` and its own
//! extension of the parent's visited path. A child whose id is already on the
//! path is marked circular and not expanded. Links and non-linkable types are
//! terminal.
//!
//! # Depth
//!
//! `max_level` does not stop traversal: the tree is expanded fully so the caller
//! can tell whether references go deeper than what it renders. Only
//! `FAILSAFE_MAX_DEPTH` stops expansion.
//!
//! The builder performs no I/O and never fails. Values of unexpected shape are
//! skipped.

use crate::config::{TreeOptions, FAILSAFE_MAX_DEPTH};
use crate::models::{
    has_sys, Entity, LinkRef, ReferenceNode, ReferenceTree, SelectionState, TreeStats,
    VisitedPath, ROOT_KEY,
};
use crate::services::link_resolver::{EntityGraph, ResolvedReferences};
use crate::services::rich_text::{extract_embedded_targets, is_rich_text};
use crate::services::ReferenceServiceError;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Build the reference tree rooted at `root`
///
/// `graph` resolves `Link` values met along the way; links it cannot resolve
/// become unresolved terminal nodes.
///
/// # Examples
///
/// ```rust
/// use refgraph_core::config::TreeOptions;
/// use refgraph_core::models::{Entity, EntityType};
/// use refgraph_core::services::{build_tree_of_references, EntityGraph};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let child = Entity::new("child", EntityType::Entry);
/// let root = Entity::new("root", EntityType::Entry)
///     .with_field("related", "en-US", json!([child.to_link_value()]));
///
/// let graph = EntityGraph::from_entities([child]);
/// let tree = build_tree_of_references(&Arc::new(root), &graph, &TreeOptions::default());
///
/// assert_eq!(tree.root.children.len(), 1);
/// assert_eq!(tree.root.children[0].key, "0-0-0");
/// assert!(tree.root.children[0].is_resolved);
/// ```
pub fn build_tree_of_references(
    root: &Arc<Entity>,
    graph: &EntityGraph,
    options: &TreeOptions,
) -> ReferenceTree {
    let mut builder = TreeBuilder {
        graph,
        stats: TreeStats::default(),
        visited: HashMap::new(),
        unique: HashSet::new(),
    };

    let root_path = VisitedPath::root(root.id());
    builder
        .visited
        .insert(ROOT_KEY.to_string(), root_path.clone());
    let children = builder.expand(root, ROOT_KEY, 1, &root_path);

    let root_node = ReferenceNode {
        key: ROOT_KEY.to_string(),
        entity: Arc::clone(root),
        level: 1,
        node_type: root.entity_type().clone(),
        is_resolved: true,
        is_circular: false,
        children,
    };

    let mut stats = builder.stats;
    stats.unique_entities = builder.unique.len();
    stats.max_depth = stats.max_depth.max(1);
    stats.exceeds_max_level = stats.max_depth > options.max_level;

    let selection = SelectionState::seeded(
        root_node.iter(),
        options.are_all_references_selected,
        &options.selected_states,
    );

    tracing::debug!(
        "Built reference tree for {}: {} references, depth {}, exceeds max level {}: {}",
        root.id(),
        stats.total_references,
        stats.max_depth,
        options.max_level,
        stats.exceeds_max_level
    );

    ReferenceTree {
        root: root_node,
        stats,
        selection,
        max_level: options.max_level,
        visited: builder.visited,
    }
}

/// Parse a raw `{ items, includes }` payload and build its tree
pub fn build_tree_from_response(
    response: &Value,
    root_id: Option<&str>,
    options: &TreeOptions,
) -> Result<ReferenceTree, ReferenceServiceError> {
    let resolved = ResolvedReferences::from_response(response, root_id)?;
    Ok(build_tree_of_references(
        &resolved.root,
        &resolved.graph,
        options,
    ))
}

/// A reference-shaped value found in a field, with its key coordinates
struct Discovered<'a> {
    field_index: usize,
    occurrence: usize,
    value: &'a Value,
}

struct TreeBuilder<'g> {
    graph: &'g EntityGraph,
    stats: TreeStats,
    visited: HashMap<String, VisitedPath>,
    unique: HashSet<String>,
}

impl<'g> TreeBuilder<'g> {
    /// Build the children of `entity`, which sits at `key` / `level`
    fn expand(
        &mut self,
        entity: &Entity,
        key: &str,
        level: usize,
        path: &VisitedPath,
    ) -> Vec<ReferenceNode> {
        let discovered = discover_references(entity);
        if discovered.is_empty() {
            return Vec::new();
        }

        if level >= FAILSAFE_MAX_DEPTH {
            tracing::warn!(
                "Reference traversal stopped at failsafe depth {} below {} ({})",
                FAILSAFE_MAX_DEPTH,
                entity.id(),
                key
            );
            self.stats.hit_failsafe = true;
            return Vec::new();
        }

        let child_level = level + 1;
        let mut children = Vec::with_capacity(discovered.len());

        for found in discovered {
            let Some(link) = LinkRef::from_value(found.value) else {
                tracing::trace!("Skipping reference without sys.id under {}", key);
                continue;
            };
            let Some(resolution) = self.graph.resolve(&link) else {
                continue;
            };

            let child_entity = Arc::clone(resolution.entity());
            let child_key = format!("{}-{}-{}", key, found.field_index, found.occurrence);
            let is_circular = path.contains(child_entity.id());
            let child_path = path.push(child_entity.id());
            let is_resolved = resolution.is_resolved();

            self.record(child_level, &child_entity);
            self.visited.insert(child_key.clone(), child_path.clone());

            let grandchildren = if is_resolved && !is_circular {
                self.expand(&child_entity, &child_key, child_level, &child_path)
            } else {
                Vec::new()
            };

            children.push(ReferenceNode {
                key: child_key,
                node_type: child_entity.entity_type().clone(),
                entity: child_entity,
                level: child_level,
                is_resolved,
                is_circular,
                children: grandchildren,
            });
        }

        children
    }

    fn record(&mut self, level: usize, entity: &Entity) {
        *self.stats.references_per_level.entry(level).or_insert(0) += 1;
        self.stats.total_references += 1;
        self.stats.max_depth = self.stats.max_depth.max(level);
        self.unique.insert(entity.selection_key());
    }
}

/// All reference-shaped values in an entity's fields, in field/locale order
fn discover_references(entity: &Entity) -> Vec<Discovered<'_>> {
    let mut discovered = Vec::new();

    for (field_index, (name, locales)) in entity.fields.iter().enumerate() {
        let Some(locales) = locales.as_object() else {
            tracing::trace!("Field {} of {} is not localized, skipping", name, entity.id());
            continue;
        };

        let mut occurrence = 0;
        for value in locales.values() {
            for target in references_in_value(value) {
                discovered.push(Discovered {
                    field_index,
                    occurrence,
                    value: target,
                });
                occurrence += 1;
            }
        }
    }

    discovered
}

/// Reference-shaped values inside one localized field value
fn references_in_value(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) if items.iter().all(has_sys) => items.iter().collect(),
        Value::Object(_) if is_rich_text(value) => extract_embedded_targets(value),
        Value::Object(_) if has_sys(value) => vec![value],
        _ => Vec::new(),
    }
}

#[cfg(test)]
#[path = "tree_builder_test.rs"]
mod tree_builder_test;
