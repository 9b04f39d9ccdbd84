//! Bulk actions over selected references
//!
//! Publishing and validating run against the backend through a
//! `BulkActionService`; whether the current user may run them at all is a
//! `PermissionChecker` decision. Both are collaborators injected by the caller.
//!
//! Per-entity failures come back keyed by entity id and are mapped onto every
//! tree node showing that entity, so the UI can flag them.

use crate::models::{Entity, EntityType, ReferenceTree};
use crate::services::render::{CardNode, ReferenceCard};
use crate::services::ReferenceServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Publish,
    Validate,
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BulkAction::Publish => f.write_str("publish"),
            BulkAction::Validate => f.write_str("validate"),
        }
    }
}

/// Why a single entity failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BulkErrorKind {
    /// Field validation failed
    Validation { details: Vec<String> },
    /// The backend throttled the request
    RateLimited,
    /// The entity changed since it was fetched
    VersionMismatch { expected: i64, actual: i64 },
    Other { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkActionError {
    pub entity_id: String,
    pub entity_type: EntityType,
    pub kind: BulkErrorKind,
}

/// Result of one bulk action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkActionReport {
    pub action: BulkAction,
    /// Ids of entities the action succeeded for
    pub succeeded: Vec<String>,
    pub errors: Vec<BulkActionError>,
}

impl BulkActionReport {
    pub fn new(action: BulkAction) -> Self {
        Self {
            action,
            succeeded: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_successes(&self) -> bool {
        !self.succeeded.is_empty()
    }
}

/// Bulk action errors grouped by tree node key
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkErrorIndex {
    by_key: BTreeMap<String, Vec<BulkActionError>>,
}

impl BulkErrorIndex {
    pub fn errors_for(&self, key: &str) -> &[BulkActionError] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn node_keys(&self) -> impl Iterator<Item = &str> {
        self.by_key.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Set `has_error` on every rendered card that has errors
    pub fn apply_to_cards(&self, cards: &mut CardNode) {
        cards.for_each_card_mut(&mut |card: &mut ReferenceCard| {
            card.has_error = self.by_key.contains_key(&card.key);
        });
    }
}

/// Map per-entity errors onto every node that shows the failing entity
pub fn map_errors_to_nodes(tree: &ReferenceTree, report: &BulkActionReport) -> BulkErrorIndex {
    let mut index = BulkErrorIndex::default();
    for error in &report.errors {
        let mut matched = false;
        for node in tree.occurrences(&error.entity_id) {
            matched = true;
            index
                .by_key
                .entry(node.key.clone())
                .or_default()
                .push(error.clone());
        }
        if !matched {
            tracing::debug!(
                "Bulk {} error for {} has no node in the tree",
                report.action,
                error.entity_id
            );
        }
    }
    index
}

/// Runs bulk actions against the backend
#[async_trait]
pub trait BulkActionService: Send + Sync {
    async fn run(
        &self,
        action: BulkAction,
        entities: &[Arc<Entity>],
    ) -> Result<BulkActionReport, ReferenceServiceError>;
}

/// Decides whether bulk actions are enabled for the current user
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    async fn can_perform(&self, action: BulkAction, entities: &[Arc<Entity>]) -> bool;
}

/// Permission checker that allows everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl PermissionChecker for AllowAll {
    async fn can_perform(&self, _action: BulkAction, _entities: &[Arc<Entity>]) -> bool {
        true
    }
}
