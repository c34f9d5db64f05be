//! Query criteria accepted by query-capable stores
//!
//! Criteria are scoped to one [`Collection`]; the store restricts its scan
//! to that collection before evaluating the conditions, so only summaries
//! are decoded for rejected entities.

use fedmeta_common::{Collection, CompareOp, EntityField, EntityFields, EntityRole};
use std::fmt;

/// One bound comparison
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Condition {
    pub field: EntityField,
    pub op: CompareOp,
    pub value: String,
}

impl Condition {
    fn holds(&self, entity: &(impl EntityFields + ?Sized)) -> bool {
        match self.field {
            EntityField::EntityId => self.op.apply(Some(entity.entity_id().as_str()), &self.value),
            EntityField::WorkflowState => self.op.apply(entity.workflow_state(), &self.value),
            EntityField::Role => {
                let Some(role) = EntityRole::parse(&self.value) else {
                    return false;
                };
                match self.op {
                    CompareOp::Eq => entity.has_role(role),
                    CompareOp::Neq => !entity.has_role(role),
                }
            }
        }
    }
}

/// Conjunction of conditions over one collection
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryCriteria {
    collection: Collection,
    conditions: Vec<Condition>,
}

impl QueryCriteria {
    /// Criteria selecting the whole collection
    #[must_use]
    pub const fn for_collection(collection: Collection) -> Self {
        Self {
            collection,
            conditions: Vec::new(),
        }
    }

    /// Add a condition
    #[must_use]
    pub fn and_where(mut self, field: EntityField, op: CompareOp, value: impl Into<String>) -> Self {
        self.conditions.push(Condition {
            field,
            op,
            value: value.into(),
        });
        self
    }

    /// Conjoin another criteria's conditions; the collection of `self` is kept
    #[must_use]
    pub fn and_criteria(mut self, other: Self) -> Self {
        self.conditions.extend(other.conditions);
        self
    }

    #[must_use]
    pub const fn collection(&self) -> Collection {
        self.collection
    }

    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Store-side evaluation against one summary or entity
    #[must_use]
    pub fn admits(&self, entity: &(impl EntityFields + ?Sized)) -> bool {
        self.collection.contains(entity) && self.conditions.iter().all(|c| c.holds(entity))
    }
}

impl fmt::Display for QueryCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SELECT {alias} FROM {} {alias}",
            self.collection.name(),
            alias = self.collection.alias()
        )?;
        for (i, c) in self.conditions.iter().enumerate() {
            let keyword = if i == 0 { "WHERE" } else { "AND" };
            write!(
                f,
                " {keyword} {}.{} {} :p{i}",
                self.collection.alias(),
                c.field.as_str(),
                c.op.symbol()
            )?;
        }
        Ok(())
    }
}
