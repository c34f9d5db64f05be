//! Fixed-decision policy adapter
//!
//! Used when no remote registry is configured: every access question gets
//! the same answer and the remote collection is empty.

use crate::adapter::PolicyAdapter;
use crate::arp::AttributeReleasePolicy;
use async_trait::async_trait;
use fedmeta_common::config::FallbackDecision;
use fedmeta_common::{DomainEntity, EntityId, EntityMap, Error, Result};
use tracing::debug;

/// Policy adapter answering every access question with one decision
#[derive(Debug, Clone, Copy)]
pub struct FixedPolicyAdapter {
    decision: FallbackDecision,
}

impl FixedPolicyAdapter {
    #[must_use]
    pub const fn new(decision: FallbackDecision) -> Self {
        Self { decision }
    }

    #[must_use]
    pub const fn allow_all() -> Self {
        Self::new(FallbackDecision::Allow)
    }

    #[must_use]
    pub const fn deny_all() -> Self {
        Self::new(FallbackDecision::Deny)
    }

    const fn allowed(&self) -> bool {
        matches!(self.decision, FallbackDecision::Allow)
    }
}

#[async_trait]
impl PolicyAdapter for FixedPolicyAdapter {
    fn name(&self) -> &str {
        if self.allowed() { "allow-all" } else { "deny-all" }
    }

    async fn filter_entities_by_sp(
        &self,
        mut entities: EntityMap,
        sp_entity_id: &EntityId,
    ) -> Result<EntityMap> {
        debug!("{} filtering identity providers for {}", self.name(), sp_entity_id);
        if self.allowed() {
            for entity in entities.iter_mut().filter(|e| e.is_identity_provider()) {
                entity.access = Some(true);
            }
        } else {
            entities.retain(|e| !e.is_identity_provider());
        }
        Ok(entities)
    }

    async fn mark_entities_by_sp(
        &self,
        mut entities: EntityMap,
        _sp_entity_id: &EntityId,
    ) -> Result<EntityMap> {
        let allowed = self.allowed();
        for entity in entities.iter_mut().filter(|e| e.is_identity_provider()) {
            entity.access = Some(allowed);
        }
        Ok(entities)
    }

    async fn is_connection_allowed(
        &self,
        _sp_entity_id: &EntityId,
        _idp_entity_id: &EntityId,
    ) -> Result<bool> {
        Ok(self.allowed())
    }

    async fn get_remote_metadata(&self) -> Result<EntityMap> {
        Ok(EntityMap::new())
    }

    async fn get_entity(&self, entity_id: &EntityId) -> Result<DomainEntity> {
        Err(Error::EntityNotFound(entity_id.clone()))
    }

    async fn get_arp(&self, _sp_entity_id: &EntityId) -> Result<Option<AttributeReleasePolicy>> {
        Ok(None)
    }
}
