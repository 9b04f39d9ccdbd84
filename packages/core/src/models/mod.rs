//! Data Models
//!
//! This module contains the data structures the reference graph is built from
//! and built into:
//!
//! - `Entity` - Content object (`sys` + localized `fields`)
//! - `ReferenceNode` / `ReferenceTree` - One node per occurrence of an entity
//! - `SelectionState` - Entity-keyed selection for bulk actions
//! - `VisitedPath` - Persistent per-path visited-id sequence for cycle detection

mod entity;
mod reference_tree;
mod selection;
mod visited_path;

pub use entity::{has_sys, Entity, EntityStatus, EntityType, LinkRef, Sys, ValidationError};
pub use reference_tree::{Nodes, ReferenceNode, ReferenceTree, TreeStats, ROOT_KEY};
pub use selection::SelectionState;
pub use visited_path::VisitedPath;
