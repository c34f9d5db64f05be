use super::EntityFilter;
use fedmeta_common::{Collection, CompareOp, EntityField, EntityFields, Expr, FieldRef};
use fedmeta_store::QueryCriteria;
use std::fmt;

/// Rejects exactly one entity identifier
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoveEntityByEntityId {
    entity_id: String,
}

impl RemoveEntityByEntityId {
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
        }
    }

    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }
}

impl EntityFilter for RemoveEntityByEntityId {
    fn matches(&self, entity: &dyn EntityFields) -> bool {
        entity.entity_id().as_str() != self.entity_id
    }

    fn to_query_criteria(&self, collection: Collection) -> QueryCriteria {
        QueryCriteria::for_collection(collection).and_where(
            EntityField::EntityId,
            CompareOp::Neq,
            self.entity_id.clone(),
        )
    }

    fn to_expression(&self, collection: Collection) -> Expr {
        Expr::within(
            collection,
            Expr::neq(
                FieldRef::new(collection, EntityField::EntityId),
                self.entity_id.clone(),
            ),
        )
    }
}

impl fmt::Display for RemoveEntityByEntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoveEntityByEntityId -> {}", self.entity_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedmeta_common::{EntityId, IndexedEntity, RoleFlags};

    #[test]
    fn test_rejects_only_configured_id() {
        let filter = RemoveEntityByEntityId::new("https://x");
        let x = IndexedEntity::new(EntityId::new_unchecked("https://x"), RoleFlags::IDP);
        let y = IndexedEntity::new(EntityId::new_unchecked("https://y"), RoleFlags::IDP);
        let prefix = IndexedEntity::new(EntityId::new_unchecked("https://x/"), RoleFlags::SP);

        assert!(!filter.matches(&x));
        assert!(filter.matches(&y));
        assert!(filter.matches(&prefix));
    }

    #[test]
    fn test_expression_rendering() {
        let filter = RemoveEntityByEntityId::new("it's");
        assert_eq!(
            filter.to_expression(Collection::Entities).to_string(),
            "entity.entity_id <> 'it''s'"
        );
        assert_eq!(
            filter.to_expression(Collection::IdentityProviders).to_string(),
            "(idp.role = 'idp' AND idp.entity_id <> 'it''s')"
        );
        assert_eq!(filter.to_string(), "RemoveEntityByEntityId -> it's");
    }
}
