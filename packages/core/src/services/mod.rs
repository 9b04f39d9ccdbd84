//! Reference Services
//!
//! This module contains the logic built on top of the data models:
//!
//! - `tree_builder` - Cycle-safe, depth-bounded reference tree construction
//! - `link_resolver` - `EntityGraph` lookup of `Link` targets in a references payload
//! - `rich_text` - Embedded reference extraction from rich-text documents
//! - `render` - Card rendering with "+more" placeholders past the max level
//! - `bulk_actions` - Bulk publish/validate types and error-to-node mapping
//! - `references_service` - Async orchestration of fetch, build, selection and bulk actions
//!
//! The tree builder is pure and synchronous; everything that talks to
//! collaborators lives in `references_service`.

pub mod bulk_actions;
pub mod error;
pub mod link_resolver;
pub mod references_service;
pub mod render;
pub mod rich_text;
pub mod tree_builder;

pub use bulk_actions::{
    map_errors_to_nodes, AllowAll, BulkAction, BulkActionError, BulkActionReport,
    BulkActionService, BulkErrorIndex, BulkErrorKind, PermissionChecker,
};
pub use error::ReferenceServiceError;
pub use link_resolver::{EntityGraph, Resolution, ResolvedReferences};
pub use references_service::{
    BulkOutcome, EntityTitleService, FieldTitleService, ReferenceSource, ReferencesService,
    StaticReferenceSource,
};
pub use render::{render_cards, render_cards_at, CardNode, ReferenceCard};
pub use tree_builder::{build_tree_from_response, build_tree_of_references};
