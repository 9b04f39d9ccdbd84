//! Link Resolution
//!
//! The references endpoint answers with `{ items, includes: { Entry, Asset } }`
//! where fields hold `Link` stubs instead of nested entities. `EntityGraph`
//! indexes every entity in that payload by `(type, id)` so the tree builder can
//! swap a link for its target while walking, without materialising a (possibly
//! cyclic) nested object graph.
//!
//! Links whose target is not in the payload stay links and become unresolved
//! nodes ("missing or inaccessible").

use crate::models::{Entity, EntityType, LinkRef};
use crate::services::ReferenceServiceError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of resolving one reference-shaped value
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A full Entry or Asset
    Resolved(Arc<Entity>),
    /// A link whose target is not available
    Unresolved(Arc<Entity>),
    /// An entity of a type that cannot be expanded (e.g. `ScheduledAction`)
    NotLinkable(Arc<Entity>),
}

impl Resolution {
    pub fn entity(&self) -> &Arc<Entity> {
        match self {
            Resolution::Resolved(entity)
            | Resolution::Unresolved(entity)
            | Resolution::NotLinkable(entity) => entity,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

/// Index of resolved entities keyed by `(type, id)`
#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    entities: HashMap<(EntityType, String), Arc<Entity>>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let mut graph = Self::new();
        for entity in entities {
            graph.insert(entity);
        }
        graph
    }

    /// Add an entity, keeping whichever copy has the higher `sys.version`
    pub fn insert(&mut self, entity: Entity) -> Arc<Entity> {
        let key = (entity.entity_type().clone(), entity.id().to_string());
        if let Some(existing) = self.entities.get(&key) {
            if existing.sys.version > entity.sys.version {
                return Arc::clone(existing);
            }
        }
        let entity = Arc::new(entity);
        self.entities.insert(key, Arc::clone(&entity));
        entity
    }

    pub fn get(&self, entity_type: &EntityType, id: &str) -> Option<&Arc<Entity>> {
        self.entities.get(&(entity_type.clone(), id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Resolve a reference-shaped value
    ///
    /// Returns `None` for values that cannot be read as an entity at all; the
    /// caller skips those.
    pub fn resolve(&self, link: &LinkRef<'_>) -> Option<Resolution> {
        if link.is_link() {
            return Some(self.resolve_link(link));
        }
        match &link.entity_type {
            EntityType::Entry | EntityType::Asset => {
                if let Some(entity) = self.get(&link.entity_type, link.id) {
                    return Some(Resolution::Resolved(Arc::clone(entity)));
                }
                match Entity::from_value(link.value) {
                    Ok(entity) => Some(Resolution::Resolved(Arc::new(entity))),
                    Err(e) => {
                        tracing::trace!("Skipping unreadable inline entity {}: {}", link.id, e);
                        None
                    }
                }
            }
            other => {
                let entity = Entity::from_value(link.value)
                    .unwrap_or_else(|_| Entity::new(link.id, other.clone()));
                Some(Resolution::NotLinkable(Arc::new(entity)))
            }
        }
    }

    fn resolve_link(&self, link: &LinkRef<'_>) -> Resolution {
        let candidates: &[EntityType] = match &link.link_type {
            Some(EntityType::Entry) => &[EntityType::Entry],
            Some(EntityType::Asset) => &[EntityType::Asset],
            Some(_) => &[],
            None => &[EntityType::Entry, EntityType::Asset],
        };

        for candidate in candidates {
            if let Some(entity) = self.get(candidate, link.id) {
                return Resolution::Resolved(Arc::clone(entity));
            }
        }

        let link_type = match link.target_type() {
            EntityType::Link => EntityType::Entry,
            target => target,
        };
        Resolution::Unresolved(Arc::new(Entity::link(link.id, link_type)))
    }
}

/// A references payload split into its root entity and the lookup graph
#[derive(Debug, Clone)]
pub struct ResolvedReferences {
    pub root: Arc<Entity>,
    pub graph: EntityGraph,
}

impl ResolvedReferences {
    /// Read a raw `{ items, includes }` payload
    ///
    /// The root is the item whose id is `root_id`, or the first item when no id
    /// is given.
    ///
    /// # Errors
    ///
    /// - `MalformedResponse` if `items` or `includes` have the wrong shape
    /// - `ValidationFailed` if an entity has no usable `sys` block
    /// - `RootNotFound` if no item matches
    pub fn from_response(
        response: &Value,
        root_id: Option<&str>,
    ) -> Result<Self, ReferenceServiceError> {
        let items = response
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| ReferenceServiceError::malformed_response("missing items array"))?;

        let mut graph = EntityGraph::new();
        let mut root = None;

        for item in items {
            let entity = graph.insert(Entity::from_value(item)?);
            let is_root = match root_id {
                Some(id) => entity.id() == id,
                None => root.is_none(),
            };
            if is_root && root.is_none() {
                root = Some(entity);
            }
        }

        if let Some(includes) = response.get("includes") {
            let includes = includes.as_object().ok_or_else(|| {
                ReferenceServiceError::malformed_response("includes must be an object")
            })?;
            for (kind, entities) in includes {
                let entities = entities.as_array().ok_or_else(|| {
                    ReferenceServiceError::malformed_response(format!(
                        "includes.{} must be an array",
                        kind
                    ))
                })?;
                for entity in entities {
                    graph.insert(Entity::from_value(entity)?);
                }
            }
        }

        if let Some(errors) = response.get("errors").and_then(Value::as_array) {
            tracing::debug!("References payload reports {} unresolvable links", errors.len());
        }

        let root = root.ok_or_else(|| {
            ReferenceServiceError::root_not_found(root_id.unwrap_or("<first item>"))
        })?;

        // The root may have been replaced by a newer copy from includes
        let root = graph
            .get(root.entity_type(), root.id())
            .cloned()
            .unwrap_or(root);

        tracing::debug!(
            "Resolved references payload for {}: {} entities",
            root.id(),
            graph.len()
        );

        Ok(Self { root, graph })
    }
}
