//! Card rendering with a max level
//!
//! Turns a `ReferenceTree` into the shape the UI draws: one card per node up to
//! `max_level`, and below any card at `max_level` that still has children, a
//! single "+more" placeholder standing in for the whole hidden branch.

use crate::models::{Entity, EntityStatus, EntityType, ReferenceNode, ReferenceTree};
use serde::Serialize;
use std::sync::Arc;

/// A rendered reference
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceCard {
    pub key: String,
    pub entity_id: String,
    pub entity_type: EntityType,
    pub level: usize,
    pub is_resolved: bool,
    pub is_circular: bool,
    pub is_selected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EntityStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Set when the last bulk action reported an error for this entity
    pub has_error: bool,
    pub children: Vec<CardNode>,
    #[serde(skip)]
    pub entity: Arc<Entity>,
}

impl ReferenceCard {
    /// Unresolved links are shown as "missing or inaccessible"
    pub fn is_missing(&self) -> bool {
        !self.is_resolved && self.entity_type == EntityType::Link
    }
}

/// Either a card or the aggregated placeholder for a truncated branch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CardNode {
    Card(ReferenceCard),
    #[serde(rename_all = "camelCase")]
    More {
        key: String,
        level: usize,
        /// Number of references hidden behind the placeholder
        hidden: usize,
    },
}

impl CardNode {
    pub fn as_card(&self) -> Option<&ReferenceCard> {
        match self {
            CardNode::Card(card) => Some(card),
            CardNode::More { .. } => None,
        }
    }

    pub fn is_more(&self) -> bool {
        matches!(self, CardNode::More { .. })
    }

    pub fn children(&self) -> &[CardNode] {
        match self {
            CardNode::Card(card) => &card.children,
            CardNode::More { .. } => &[],
        }
    }

    /// Number of cards in this subtree
    pub fn card_count(&self) -> usize {
        match self {
            CardNode::Card(card) => 1 + card.children.iter().map(CardNode::card_count).sum::<usize>(),
            CardNode::More { .. } => 0,
        }
    }

    /// Number of "+more" placeholders in this subtree
    pub fn placeholder_count(&self) -> usize {
        match self {
            CardNode::Card(card) => card.children.iter().map(CardNode::placeholder_count).sum(),
            CardNode::More { .. } => 1,
        }
    }

    /// Visit every card, parents before children
    pub fn for_each_card_mut(&mut self, f: &mut impl FnMut(&mut ReferenceCard)) {
        if let CardNode::Card(card) = self {
            f(card);
            for child in &mut card.children {
                child.for_each_card_mut(f);
            }
        }
    }
}

/// Render `tree` at its own max level
pub fn render_cards(tree: &ReferenceTree) -> CardNode {
    render_cards_at(tree, tree.max_level)
}

/// Render `tree`, collapsing everything below `max_level`
pub fn render_cards_at(tree: &ReferenceTree, max_level: usize) -> CardNode {
    render_node(tree, &tree.root, max_level.max(1))
}

fn render_node(tree: &ReferenceTree, node: &ReferenceNode, max_level: usize) -> CardNode {
    let children = if node.level >= max_level {
        if node.children.is_empty() {
            Vec::new()
        } else {
            vec![CardNode::More {
                key: format!("{}-more", node.key),
                level: node.level + 1,
                hidden: node.descendant_count(),
            }]
        }
    } else {
        node.children
            .iter()
            .map(|child| render_node(tree, child, max_level))
            .collect()
    };

    CardNode::Card(ReferenceCard {
        key: node.key.clone(),
        entity_id: node.id().to_string(),
        entity_type: node.node_type.clone(),
        level: node.level,
        is_resolved: node.is_resolved,
        is_circular: node.is_circular,
        is_selected: node.is_resolved && tree.is_selected(node),
        status: node.is_resolved.then(|| node.entity.status()),
        title: None,
        has_error: false,
        children,
        entity: Arc::clone(&node.entity),
    })
}
