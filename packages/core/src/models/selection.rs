//! Entity-keyed selection state
//!
//! Selection is tracked per entity (`"<entityId>-<entityType>"`), not per tree
//! position: checking one occurrence of an entity checks all of them.

use crate::models::{Entity, EntityStatus, ReferenceNode};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelectionState {
    selected: HashMap<String, bool>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed selection from a node list
    ///
    /// With `all_selected == false` the state starts empty. Otherwise every
    /// resolved entity is selected, narrowed to `states` when that list is not
    /// empty.
    pub fn seeded<'a>(
        nodes: impl IntoIterator<Item = &'a ReferenceNode>,
        all_selected: bool,
        states: &[EntityStatus],
    ) -> Self {
        let mut selection = Self::new();
        if !all_selected {
            return selection;
        }

        for node in nodes {
            if !node.is_resolved {
                continue;
            }
            if !states.is_empty() && !states.contains(&node.entity.status()) {
                continue;
            }
            selection.selected.insert(node.selection_key(), true);
        }
        selection
    }

    pub fn is_selected(&self, key: &str) -> bool {
        self.selected.get(key).copied().unwrap_or(false)
    }

    /// Flip the flag for `key`, returning the new value
    pub fn toggle(&mut self, key: &str) -> bool {
        let flag = self.selected.entry(key.to_string()).or_insert(false);
        *flag = !*flag;
        *flag
    }

    pub fn set(&mut self, key: &str, selected: bool) {
        self.selected.insert(key.to_string(), selected);
    }

    /// Number of selected entity keys
    pub fn len(&self) -> usize {
        self.selected.values().filter(|flag| **flag).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Filter a flat node list down to selected entities, each entity once
    pub fn filter<'a>(&self, nodes: impl IntoIterator<Item = &'a ReferenceNode>) -> Vec<Arc<Entity>> {
        let mut seen = HashSet::new();
        nodes
            .into_iter()
            .filter(|node| node.is_resolved)
            .filter(|node| {
                let key = node.selection_key();
                self.is_selected(&key) && seen.insert(key)
            })
            .map(|node| Arc::clone(&node.entity))
            .collect()
    }
}
