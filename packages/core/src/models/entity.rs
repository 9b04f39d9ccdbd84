//! Content Entity Data Structures
//!
//! This module defines the `Entity` struct shared by every content object the
//! reference graph touches: entries, assets, unresolved links and any other
//! `sys.type` the backend returns.
//!
//! # Shape
//!
//! - **`sys`**: identity and versioning metadata (`id`, `type`, `version`, ...)
//! - **`fields`**: `field name → locale code → value`, kept in payload order
//!
//! # Examples
//!
//! ```rust
//! use refgraph_core::models::{Entity, EntityType};
//! use serde_json::json;
//!
//! let entry = Entity::from_value(&json!({
//!     "sys": { "id": "article-1", "type": "Entry", "version": 3 },
//!     "fields": { "title": { "en-US": "Hello" } }
//! }))
//! .unwrap();
//!
//! assert_eq!(entry.id(), "article-1");
//! assert_eq!(entry.entity_type(), &EntityType::Entry);
//! assert_eq!(entry.selection_key(), "article-1-Entry");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Validation errors raised while reading entities out of raw JSON
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid entity shape: {0}")]
    InvalidShape(String),

    #[error("Unknown entity status: {0}")]
    UnknownStatus(String),
}

/// Value of `sys.type`
///
/// Only `Entry` and `Asset` are linkable content. `Link` marks a reference whose
/// target has not been (or could not be) resolved. Everything else, for example
/// `ScheduledAction`, is carried through as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityType {
    Entry,
    Asset,
    Link,
    Other(String),
}

impl EntityType {
    pub fn as_str(&self) -> &str {
        match self {
            EntityType::Entry => "Entry",
            EntityType::Asset => "Asset",
            EntityType::Link => "Link",
            EntityType::Other(name) => name,
        }
    }

    /// Entry and Asset are the only types that can be expanded into children
    pub fn is_linkable(&self) -> bool {
        matches!(self, EntityType::Entry | EntityType::Asset)
    }
}

impl From<&str> for EntityType {
    fn from(value: &str) -> Self {
        match value {
            "Entry" => EntityType::Entry,
            "Asset" => EntityType::Asset,
            "Link" => EntityType::Link,
            other => EntityType::Other(other.to_string()),
        }
    }
}

impl From<String> for EntityType {
    fn from(value: String) -> Self {
        EntityType::from(value.as_str())
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publishing status derived from `sys` versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Draft,
    Changed,
    Published,
    Archived,
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::Draft => "draft",
            EntityStatus::Changed => "changed",
            EntityStatus::Published => "published",
            EntityStatus::Archived => "archived",
        }
    }
}

impl std::str::FromStr for EntityStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "draft" => Ok(EntityStatus::Draft),
            "changed" => Ok(EntityStatus::Changed),
            "published" => Ok(EntityStatus::Published),
            "archived" => Ok(EntityStatus::Archived),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `sys` block of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sys {
    pub id: String,

    #[serde(rename = "type")]
    pub entity_type: EntityType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,

    /// Target type of a `Link` (e.g. "Entry")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<EntityType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_version: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_version: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl Sys {
    pub fn new(id: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            id: id.into(),
            entity_type,
            version: None,
            link_type: None,
            published_version: None,
            archived_version: None,
            updated_at: None,
            published_at: None,
        }
    }
}

/// A content object: `sys` metadata plus localized `fields`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub sys: Sys,

    /// `field name → locale code → value`
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl Entity {
    /// Create an entity with no fields
    pub fn new(id: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            sys: Sys::new(id, entity_type),
            fields: Map::new(),
        }
    }

    /// Create an unresolved link placeholder pointing at `(link_type, id)`
    pub fn link(id: impl Into<String>, link_type: EntityType) -> Self {
        let mut sys = Sys::new(id, EntityType::Link);
        sys.link_type = Some(link_type);
        Self {
            sys,
            fields: Map::new(),
        }
    }

    /// Parse an entity out of raw JSON
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingField` when `sys`, `sys.id` or `sys.type`
    /// is absent, and `ValidationError::InvalidShape` for anything serde rejects.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let sys = value
            .get("sys")
            .ok_or_else(|| ValidationError::MissingField("sys".to_string()))?;
        if sys.get("id").and_then(Value::as_str).is_none() {
            return Err(ValidationError::MissingField("sys.id".to_string()));
        }
        if sys.get("type").and_then(Value::as_str).is_none() {
            return Err(ValidationError::MissingField("sys.type".to_string()));
        }
        if let Some(fields) = value.get("fields") {
            if !fields.is_object() && !fields.is_null() {
                return Err(ValidationError::InvalidShape(
                    "fields must be an object".to_string(),
                ));
            }
        }

        let mut value = value.clone();
        if value.get("fields").is_some_and(Value::is_null) {
            if let Some(obj) = value.as_object_mut() {
                obj.remove("fields");
            }
        }
        serde_json::from_value(value).map_err(|e| ValidationError::InvalidShape(e.to_string()))
    }

    /// Builder-style helper to set a localized field value
    pub fn with_field(mut self, field: &str, locale: &str, value: Value) -> Self {
        let slot = self
            .fields
            .entry(field.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(locales) = slot.as_object_mut() {
            locales.insert(locale.to_string(), value);
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.sys.id
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.sys.entity_type
    }

    /// `"<entityId>-<entityType>"`, the key used for selection state
    pub fn selection_key(&self) -> String {
        format!("{}-{}", self.sys.id, self.sys.entity_type)
    }

    /// Publishing status derived from `sys` versions
    pub fn status(&self) -> EntityStatus {
        let sys = &self.sys;
        if sys.archived_version.is_some() {
            return EntityStatus::Archived;
        }
        match (sys.published_version, sys.version) {
            (Some(published), Some(version)) if published.checked_add(1) == Some(version) => {
                EntityStatus::Published
            }
            (Some(_), _) => EntityStatus::Changed,
            (None, _) => EntityStatus::Draft,
        }
    }

    /// Value of `fields[field][locale]`, if present
    pub fn field_value(&self, field: &str, locale: &str) -> Option<&Value> {
        self.fields.get(field)?.get(locale)
    }

    /// Build a JSON stub `{"sys": {"type": "Link", ...}}` pointing at this entity
    pub fn to_link_value(&self) -> Value {
        serde_json::json!({
            "sys": {
                "type": "Link",
                "linkType": self.sys.entity_type.as_str(),
                "id": self.sys.id,
            }
        })
    }
}

/// Whether a JSON value carries an object-shaped `sys` block
pub fn has_sys(value: &Value) -> bool {
    value.get("sys").is_some_and(Value::is_object)
}

/// A reference discovered inside a field value, before resolution
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRef<'a> {
    pub id: &'a str,
    pub entity_type: EntityType,
    pub link_type: Option<EntityType>,
    pub value: &'a Value,
}

impl<'a> LinkRef<'a> {
    /// Read the `sys` block of a reference-shaped value
    ///
    /// Returns `None` when the value has no `sys` block, or its `sys.id` is not
    /// a string. A missing `sys.type` is treated as a `Link`.
    pub fn from_value(value: &'a Value) -> Option<Self> {
        let sys = value.get("sys")?.as_object()?;
        let id = sys.get("id")?.as_str()?;
        let entity_type = sys
            .get("type")
            .and_then(Value::as_str)
            .map(EntityType::from)
            .unwrap_or(EntityType::Link);
        let link_type = sys
            .get("linkType")
            .and_then(Value::as_str)
            .map(EntityType::from);

        Some(Self {
            id,
            entity_type,
            link_type,
            value,
        })
    }

    /// Type of the entity this reference points at
    pub fn target_type(&self) -> EntityType {
        match (&self.entity_type, &self.link_type) {
            (EntityType::Link, Some(link_type)) => link_type.clone(),
            (entity_type, _) => entity_type.clone(),
        }
    }

    pub fn is_link(&self) -> bool {
        self.entity_type == EntityType::Link
    }
}
