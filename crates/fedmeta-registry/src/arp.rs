//! Attribute release policies

use fedmeta_common::EntityId;
use serde::Serialize;

/// Opaque attribute release policy of one service provider
///
/// The document schema belongs to the consumer; it is passed through as
/// retrieved.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AttributeReleasePolicy {
    pub sp_entity_id: EntityId,
    pub policy: serde_json::Value,
}

impl AttributeReleasePolicy {
    #[must_use]
    pub const fn new(sp_entity_id: EntityId, policy: serde_json::Value) -> Self {
        Self {
            sp_entity_id,
            policy,
        }
    }
}
