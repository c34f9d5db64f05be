//! Raw, as-stored entity records

use fedmeta_common::EntityId;

/// The as-stored representation of one entity
///
/// Content is kept as the stored bytes; parsing belongs to the translator so
/// a malformed document is a translation failure, not a lookup failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEntityRecord {
    entity_id: EntityId,
    content: Vec<u8>,
}

impl RawEntityRecord {
    /// Create a record for the identifier it was stored under
    #[must_use]
    pub const fn new(entity_id: EntityId, content: Vec<u8>) -> Self {
        Self { entity_id, content }
    }

    /// Create a record from a JSON document
    #[must_use]
    pub fn from_json(entity_id: EntityId, document: &serde_json::Value) -> Self {
        Self {
            entity_id,
            content: document.to_string().into_bytes(),
        }
    }

    /// Identifier the record was loaded for
    #[must_use]
    pub const fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    /// Stored bytes
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }
}
