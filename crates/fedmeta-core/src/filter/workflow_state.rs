use super::EntityFilter;
use fedmeta_common::{Collection, CompareOp, EntityField, EntityFields, Expr, FieldRef};
use fedmeta_store::QueryCriteria;
use std::fmt;

/// Keeps entities in exactly one workflow state
///
/// Entities without a workflow state are rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowStateFilter {
    state: String,
}

impl WorkflowStateFilter {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }
}

impl EntityFilter for WorkflowStateFilter {
    fn matches(&self, entity: &dyn EntityFields) -> bool {
        entity.workflow_state() == Some(self.state.as_str())
    }

    fn to_query_criteria(&self, collection: Collection) -> QueryCriteria {
        QueryCriteria::for_collection(collection).and_where(
            EntityField::WorkflowState,
            CompareOp::Eq,
            self.state.clone(),
        )
    }

    fn to_expression(&self, collection: Collection) -> Expr {
        Expr::within(
            collection,
            Expr::eq(
                FieldRef::new(collection, EntityField::WorkflowState),
                self.state.clone(),
            ),
        )
    }
}

impl fmt::Display for WorkflowStateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorkflowState -> {}", self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedmeta_common::{EntityId, IndexedEntity, RoleFlags};

    #[test]
    fn test_missing_state_is_rejected() {
        let filter = WorkflowStateFilter::new("production");
        let bare = IndexedEntity::new(EntityId::new_unchecked("a"), RoleFlags::SP);
        assert!(!filter.matches(&bare));
        assert!(!filter.to_expression(Collection::Entities).evaluate(&bare));
        assert!(filter.matches(&bare.clone().with_workflow_state("production")));
        assert!(!filter.matches(&bare.with_workflow_state("Production")));
    }
}
