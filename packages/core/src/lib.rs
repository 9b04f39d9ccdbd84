//! Refgraph Core
//!
//! Builds reference trees for content entities: starting from a root entry, walk
//! every field that points at other entries or assets (directly, in arrays, or
//! embedded in rich text) and produce one node per occurrence, with per-path
//! cycle detection and a hard depth failsafe.
//!
//! # Architecture
//!
//! - **Pure builder**: `build_tree_of_references` performs no I/O and never fails
//! - **Graph lookup**: links are resolved through an `EntityGraph` index instead of
//!   a nested object graph, so cyclic content needs no shared mutable references
//! - **Path-local cycles**: each node owns a persistent visited path; siblings never
//!   see each other's ids
//! - **Entity-keyed selection**: selecting one occurrence selects all of them
//!
//! # Modules
//!
//! - [`models`] - Entities, reference nodes/trees, selection, visited paths
//! - [`config`] - Max level presets and per-build options
//! - [`services`] - Tree building, link resolution, rendering, bulk actions, orchestration

pub mod config;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::{TreeConfig, TreeOptions, FAILSAFE_MAX_DEPTH};
pub use models::*;
pub use services::*;
