//! References Service
//!
//! Coordinates everything around the pure tree builder: fetching the references
//! payload for a root entity, holding the current tree, selection changes, bulk
//! actions and card titles.
//!
//! # Ordering
//!
//! Every `load` takes a ticket from a monotonic counter. A finished load only
//! replaces the current tree if its ticket is still the newest one issued, so
//! the tree always reflects the most recently *requested* load. Older loads that
//! finish late are discarded with `ReferenceServiceError::Superseded`.
//!
//! # Collaborators
//!
//! - `ReferenceSource` - fetches raw `{ items, includes }` payloads
//! - `BulkActionService` - runs publish/validate
//! - `PermissionChecker` - gates bulk actions
//! - `EntityTitleService` - card labels

use crate::config::TreeConfig;
use crate::models::{Entity, EntityType, ReferenceTree};
use crate::services::bulk_actions::{
    map_errors_to_nodes, AllowAll, BulkAction, BulkActionReport, BulkActionService,
    BulkErrorIndex, PermissionChecker,
};
use crate::services::link_resolver::ResolvedReferences;
use crate::services::render::{render_cards, CardNode, ReferenceCard};
use crate::services::tree_builder::build_tree_of_references;
use crate::services::ReferenceServiceError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Fetches the resolved reference set of a root entity
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    async fn fetch_references(&self, entity_id: &str) -> Result<Value, ReferenceServiceError>;
}

/// Produces human-readable card titles
#[async_trait]
pub trait EntityTitleService: Send + Sync {
    async fn title_for(&self, entity: &Entity) -> Option<String>;
}

/// Reads the title from one field in one locale
#[derive(Debug, Clone)]
pub struct FieldTitleService {
    field: String,
    locale: String,
}

impl FieldTitleService {
    pub fn new(field: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            locale: locale.into(),
        }
    }
}

impl Default for FieldTitleService {
    fn default() -> Self {
        Self::new("title", "en-US")
    }
}

#[async_trait]
impl EntityTitleService for FieldTitleService {
    async fn title_for(&self, entity: &Entity) -> Option<String> {
        if !entity.entity_type().is_linkable() {
            return None;
        }
        entity
            .field_value(&self.field, &self.locale)
            .and_then(Value::as_str)
            .filter(|title| !title.trim().is_empty())
            .map(str::to_string)
    }
}

/// In-memory payloads keyed by root entity id
#[derive(Debug, Default)]
pub struct StaticReferenceSource {
    payloads: RwLock<HashMap<String, Value>>,
    reference_limit: Option<usize>,
    fetches: AtomicUsize,
}

impl StaticReferenceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject payloads holding more entities than `limit`
    pub fn with_reference_limit(mut self, limit: usize) -> Self {
        self.reference_limit = Some(limit);
        self
    }

    pub async fn insert(&self, entity_id: impl Into<String>, payload: Value) {
        self.payloads.write().await.insert(entity_id.into(), payload);
    }

    /// Number of fetches served so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Acquire)
    }
}

#[async_trait]
impl ReferenceSource for StaticReferenceSource {
    async fn fetch_references(&self, entity_id: &str) -> Result<Value, ReferenceServiceError> {
        self.fetches.fetch_add(1, Ordering::AcqRel);
        let payload = self
            .payloads
            .read()
            .await
            .get(entity_id)
            .cloned()
            .ok_or_else(|| {
                ReferenceServiceError::fetch_failed(format!("no references for {}", entity_id))
            })?;

        if let Some(limit) = self.reference_limit {
            let count = count_entities(&payload);
            if count > limit {
                return Err(ReferenceServiceError::TooManyReferences { count, limit });
            }
        }

        Ok(payload)
    }
}

fn count_entities(payload: &Value) -> usize {
    let items = payload
        .get("items")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    let includes = payload
        .get("includes")
        .and_then(Value::as_object)
        .map_or(0, |includes| {
            includes
                .values()
                .filter_map(Value::as_array)
                .map(Vec::len)
                .sum()
        });
    items + includes
}

/// Outcome of `run_bulk_action`
#[derive(Debug, Clone)]
pub struct BulkOutcome {
    pub report: BulkActionReport,
    /// Errors keyed by node key in the (possibly refreshed) current tree
    pub errors: BulkErrorIndex,
    /// Whether references were reloaded after the action
    pub refreshed: bool,
}

struct LoadedReferences {
    entity_id: String,
    resolved: ResolvedReferences,
    tree: ReferenceTree,
    rebuild_key: u64,
    errors: BulkErrorIndex,
}

/// Holds the current reference tree for one editor
pub struct ReferencesService {
    source: Arc<dyn ReferenceSource>,
    bulk_actions: Arc<dyn BulkActionService>,
    permissions: Arc<dyn PermissionChecker>,
    titles: Arc<dyn EntityTitleService>,
    config: TreeConfig,
    load_ticket: AtomicU64,
    state: RwLock<Option<LoadedReferences>>,
}

impl ReferencesService {
    /// Create a service with permissive defaults for permissions and titles
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when `config` fails validation.
    pub fn new(
        source: Arc<dyn ReferenceSource>,
        bulk_actions: Arc<dyn BulkActionService>,
        config: TreeConfig,
    ) -> Result<Self, ReferenceServiceError> {
        config
            .validate()
            .map_err(ReferenceServiceError::invalid_config)?;

        Ok(Self {
            source,
            bulk_actions,
            permissions: Arc::new(AllowAll),
            titles: Arc::new(FieldTitleService::default()),
            config,
            load_ticket: AtomicU64::new(0),
            state: RwLock::new(None),
        })
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionChecker>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_title_service(mut self, titles: Arc<dyn EntityTitleService>) -> Self {
        self.titles = titles;
        self
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Fetch the references of `entity_id` and make them the current tree
    pub async fn load(&self, entity_id: &str) -> Result<ReferenceTree, ReferenceServiceError> {
        let ticket = self.load_ticket.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!("Loading references for {} (load #{})", entity_id, ticket);

        let response = self.source.fetch_references(entity_id).await?;
        let resolved = ResolvedReferences::from_response(&response, Some(entity_id))?;
        let tree = build_tree_of_references(&resolved.root, &resolved.graph, &self.config.options());

        let mut state = self.state.write().await;
        let latest = self.load_ticket.load(Ordering::Acquire);
        if ticket != latest {
            tracing::warn!(
                "Discarding references for {}: load #{} superseded by #{}",
                entity_id,
                ticket,
                latest
            );
            return Err(ReferenceServiceError::Superseded {
                request: ticket,
                latest,
            });
        }

        let rebuild_key = state.as_ref().map_or(0, |loaded| loaded.rebuild_key);
        *state = Some(LoadedReferences {
            entity_id: entity_id.to_string(),
            resolved,
            tree: tree.clone(),
            rebuild_key,
            errors: BulkErrorIndex::default(),
        });

        tracing::info!(
            "Loaded {} references for {}",
            tree.stats.total_references,
            entity_id
        );
        Ok(tree)
    }

    /// Rebuild the tree from the cached payload, resetting selection
    pub async fn rebuild(&self) -> Result<ReferenceTree, ReferenceServiceError> {
        let mut state = self.state.write().await;
        let loaded = state.as_mut().ok_or(ReferenceServiceError::NoTreeLoaded)?;

        loaded.rebuild_key += 1;
        loaded.tree = build_tree_of_references(
            &loaded.resolved.root,
            &loaded.resolved.graph,
            &self.config.options(),
        );
        loaded.errors = BulkErrorIndex::default();

        tracing::debug!(
            "Rebuilt references for {} (key {})",
            loaded.entity_id,
            loaded.rebuild_key
        );
        Ok(loaded.tree.clone())
    }

    pub async fn current(&self) -> Option<ReferenceTree> {
        self.state.read().await.as_ref().map(|loaded| loaded.tree.clone())
    }

    pub async fn rebuild_key(&self) -> Option<u64> {
        self.state.read().await.as_ref().map(|loaded| loaded.rebuild_key)
    }

    /// Flip the selection of the entity shown at `node_key`
    pub async fn toggle(&self, node_key: &str) -> Result<bool, ReferenceServiceError> {
        let mut state = self.state.write().await;
        let loaded = state.as_mut().ok_or(ReferenceServiceError::NoTreeLoaded)?;
        loaded
            .tree
            .toggle(node_key)
            .ok_or_else(|| ReferenceServiceError::unknown_node(node_key))
    }

    pub async fn select_all(&self, selected: bool) -> Result<(), ReferenceServiceError> {
        let mut state = self.state.write().await;
        let loaded = state.as_mut().ok_or(ReferenceServiceError::NoTreeLoaded)?;
        loaded.tree.set_all_selected(selected);
        Ok(())
    }

    pub async fn selected_entities(&self) -> Result<Vec<Arc<Entity>>, ReferenceServiceError> {
        let state = self.state.read().await;
        let loaded = state.as_ref().ok_or(ReferenceServiceError::NoTreeLoaded)?;
        Ok(loaded.tree.selected_entities())
    }

    /// Run a bulk action over the current selection
    ///
    /// A publish that succeeded for at least one entity reloads the references,
    /// since statuses and versions changed. Errors are mapped onto the tree that
    /// is current afterwards.
    pub async fn run_bulk_action(
        &self,
        action: BulkAction,
    ) -> Result<BulkOutcome, ReferenceServiceError> {
        let (entity_id, entities) = {
            let state = self.state.read().await;
            let loaded = state.as_ref().ok_or(ReferenceServiceError::NoTreeLoaded)?;
            (loaded.entity_id.clone(), loaded.tree.selected_entities())
        };

        if entities.is_empty() {
            return Err(ReferenceServiceError::EmptySelection);
        }
        if !self.permissions.can_perform(action, &entities).await {
            return Err(ReferenceServiceError::permission_denied(action.to_string()));
        }

        tracing::info!("Running bulk {} on {} entities", action, entities.len());
        let report = self.bulk_actions.run(action, &entities).await?;

        let mut refreshed = false;
        if action == BulkAction::Publish && report.has_successes() {
            // the publish already happened; a failed reload keeps the current tree
            match self.load(&entity_id).await {
                Ok(_) => refreshed = true,
                Err(e) => tracing::warn!(
                    "Reload after bulk {} of {} failed, keeping current tree: {}",
                    action,
                    entity_id,
                    e
                ),
            }
        }

        let mut state = self.state.write().await;
        let loaded = state.as_mut().ok_or(ReferenceServiceError::NoTreeLoaded)?;
        let errors = map_errors_to_nodes(&loaded.tree, &report);
        loaded.errors = errors.clone();

        if !report.is_success() {
            tracing::warn!(
                "Bulk {} finished with {} errors",
                action,
                report.errors.len()
            );
        }

        Ok(BulkOutcome {
            report,
            errors,
            refreshed,
        })
    }

    /// Render the current tree with titles and error flags filled in
    pub async fn cards(&self) -> Result<CardNode, ReferenceServiceError> {
        let mut cards = {
            let state = self.state.read().await;
            let loaded = state.as_ref().ok_or(ReferenceServiceError::NoTreeLoaded)?;
            let mut cards = render_cards(&loaded.tree);
            loaded.errors.apply_to_cards(&mut cards);
            cards
        };

        let mut pending: Vec<(String, Arc<Entity>)> = Vec::new();
        cards.for_each_card_mut(&mut |card: &mut ReferenceCard| {
            if card.entity_type != EntityType::Link {
                pending.push((card.key.clone(), Arc::clone(&card.entity)));
            }
        });

        let mut titles = HashMap::new();
        for (key, entity) in pending {
            if let Some(title) = self.titles.title_for(&entity).await {
                titles.insert(key, title);
            }
        }

        cards.for_each_card_mut(&mut |card: &mut ReferenceCard| {
            card.title = titles.remove(&card.key);
        });
        Ok(cards)
    }
}
