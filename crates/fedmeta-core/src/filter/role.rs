use super::EntityFilter;
use fedmeta_common::{Collection, CompareOp, EntityField, EntityFields, EntityRole, Expr, FieldRef};
use fedmeta_store::QueryCriteria;
use std::fmt;

/// Keeps entities carrying one role
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoleFilter {
    role: EntityRole,
}

impl RoleFilter {
    #[must_use]
    pub const fn new(role: EntityRole) -> Self {
        Self { role }
    }

    #[must_use]
    pub const fn role(&self) -> EntityRole {
        self.role
    }
}

impl EntityFilter for RoleFilter {
    fn matches(&self, entity: &dyn EntityFields) -> bool {
        entity.has_role(self.role)
    }

    fn to_query_criteria(&self, collection: Collection) -> QueryCriteria {
        QueryCriteria::for_collection(collection).and_where(
            EntityField::Role,
            CompareOp::Eq,
            self.role.as_str(),
        )
    }

    fn to_expression(&self, collection: Collection) -> Expr {
        Expr::within(
            collection,
            Expr::eq(FieldRef::new(collection, EntityField::Role), self.role.as_str()),
        )
    }
}

impl fmt::Display for RoleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Role -> {}", self.role)
    }
}
