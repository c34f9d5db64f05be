//! Error types for fedmeta
//!
//! This module defines the common error type used throughout the system.

use crate::types::{EntityId, EntityIdError};
use thiserror::Error;

/// Common result type for fedmeta operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for fedmeta
#[derive(Debug, Error)]
pub enum Error {
    // Index errors
    #[error("failed to load metadata index from {location}: {reason}")]
    IndexLoad { location: String, reason: String },

    // Lookup errors
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error("invalid entity identifier: {0}")]
    InvalidEntityId(#[from] EntityIdError),

    // Translation errors
    #[error("failed to translate entity {entity_id}: {reason}")]
    Translation { entity_id: EntityId, reason: String },

    // Remote registry errors
    #[error("remote registry error: {0}")]
    RemoteAdapter(String),

    // Storage errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create an index load error
    pub fn index_load(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::IndexLoad {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a translation error
    pub fn translation(entity_id: &EntityId, reason: impl ToString) -> Self {
        Self::Translation {
            entity_id: entity_id.clone(),
            reason: reason.to_string(),
        }
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Check if this is a not found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::EntityNotFound(_))
    }

    /// Short machine-readable error kind, logged with every [`ErrorReport`]
    ///
    /// [`ErrorReport`]: crate::ErrorReport
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::IndexLoad { .. } => "index_load",
            Self::EntityNotFound(_) => "entity_not_found",
            Self::InvalidEntityId(_) => "invalid_entity_id",
            Self::Translation { .. } => "translation",
            Self::RemoteAdapter(_) => "remote_adapter",
            Self::Io(_) | Self::Storage(_) => "storage",
            Self::Configuration(_) => "configuration",
        }
    }
}
