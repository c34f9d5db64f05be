//! Registry error types

use fedmeta_common::{EntityId, Error};

/// Error from the remote service registry
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Registry unavailable: {0}")]
    Unavailable(String),
    #[error("Timeout")]
    Timeout,
    #[error("Invalid registry response: {0}")]
    InvalidResponse(String),
    #[error("Cannot map entity {entity_id}: {reason}")]
    Mapping { entity_id: String, reason: String },
    #[error("Entity not found in registry: {0}")]
    NotFound(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RegistryError {
    pub fn mapping(entity_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::Mapping {
            entity_id: entity_id.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(id) => Self::EntityNotFound(EntityId::new_unchecked(id)),
            RegistryError::Configuration(msg) => Self::Configuration(msg),
            other => Self::RemoteAdapter(other.to_string()),
        }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_into_common_error() {
        let not_found: Error = RegistryError::NotFound("https://x".into()).into();
        assert!(not_found.is_not_found());

        let timeout: Error = RegistryError::Timeout.into();
        assert!(matches!(timeout, Error::RemoteAdapter(ref msg) if msg == "Timeout"));

        let mapping: Error = RegistryError::mapping("https://y", "bad value").into();
        assert_eq!(
            mapping.to_string(),
            Error::RemoteAdapter("Cannot map entity https://y: bad value".into()).to_string()
        );
    }
}
