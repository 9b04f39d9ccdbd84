//! Service Layer Error Types
//!
//! The tree builder itself never fails; these errors come from the layers around
//! it: reading the references payload, coordinating fetches, and running bulk
//! actions.

use crate::models::ValidationError;
use thiserror::Error;

/// Reference service errors
#[derive(Error, Debug)]
pub enum ReferenceServiceError {
    /// The references payload did not have the expected shape
    #[error("Malformed references response: {0}")]
    MalformedResponse(String),

    /// The requested root entity is not part of the payload
    #[error("Root entity not found: {id}")]
    RootNotFound { id: String },

    /// An entity in the payload failed validation
    #[error("Entity validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Fetching the references payload failed
    #[error("Unable to fetch references: {0}")]
    FetchFailed(String),

    /// The backend refused to resolve a reference set this large
    #[error("Too many references to display: {count} exceeds limit of {limit}")]
    TooManyReferences { count: usize, limit: usize },

    /// A newer load started before this one finished
    #[error("Load #{request} superseded by load #{latest}")]
    Superseded { request: u64, latest: u64 },

    /// No tree has been loaded yet
    #[error("No reference tree loaded")]
    NoTreeLoaded,

    /// Node key not present in the current tree
    #[error("Unknown reference node: {key}")]
    UnknownNode { key: String },

    /// The permission checker rejected the action
    #[error("Not permitted to {action} the selected references")]
    PermissionDenied { action: String },

    /// Bulk action requested with nothing selected
    #[error("No references selected")]
    EmptySelection,

    /// The bulk action service failed as a whole
    #[error("Bulk action failed: {0}")]
    BulkActionFailed(String),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ReferenceServiceError {
    pub fn malformed_response(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    pub fn root_not_found(id: impl Into<String>) -> Self {
        Self::RootNotFound { id: id.into() }
    }

    pub fn fetch_failed(msg: impl Into<String>) -> Self {
        Self::FetchFailed(msg.into())
    }

    pub fn unknown_node(key: impl Into<String>) -> Self {
        Self::UnknownNode { key: key.into() }
    }

    pub fn permission_denied(action: impl Into<String>) -> Self {
        Self::PermissionDenied {
            action: action.into(),
        }
    }

    pub fn bulk_action_failed(msg: impl Into<String>) -> Self {
        Self::BulkActionFailed(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether the caller should show the "unable to display references" state
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedResponse(_)
                | Self::RootNotFound { .. }
                | Self::ValidationFailed(_)
                | Self::FetchFailed(_)
                | Self::TooManyReferences { .. }
        )
    }
}
