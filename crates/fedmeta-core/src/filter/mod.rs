//! Entity filters
//!
//! Each filter is one predicate with three evaluation strategies that must
//! agree on every entity:
//! - [`EntityFilter::matches`]: direct evaluation on a loaded value
//! - [`EntityFilter::to_query_criteria`]: pushdown for query-capable stores
//! - [`EntityFilter::to_expression`]: portable [`Expr`] for in-memory
//!   evaluators and simple store adapters
//!
//! Filters hold only their parameters and are freely shareable.

mod remove_entity;
mod role;
mod workflow_state;

pub use remove_entity::RemoveEntityByEntityId;
pub use role::RoleFilter;
pub use workflow_state::WorkflowStateFilter;

use fedmeta_common::{Collection, EntityFields, EntityMap, EntityRole, Expr};
use fedmeta_store::QueryCriteria;
use std::fmt;
use tracing::debug;

/// Shared contract of every filter variant
///
/// `Display` renders `"<VariantName> -> <params>"` for logs.
pub trait EntityFilter: fmt::Display + Send + Sync {
    /// Evaluate against an entity or summary
    fn matches(&self, entity: &dyn EntityFields) -> bool;

    /// Compile into store criteria scoped to `collection`
    fn to_query_criteria(&self, collection: Collection) -> QueryCriteria;

    /// Build the portable expression with fields qualified by `collection`
    fn to_expression(&self, collection: Collection) -> Expr;
}

/// Closed set of filter variants
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    RemoveEntityByEntityId(RemoveEntityByEntityId),
    WorkflowState(WorkflowStateFilter),
    Role(RoleFilter),
}

impl Filter {
    pub fn remove_entity(entity_id: impl Into<String>) -> Self {
        Self::RemoveEntityByEntityId(RemoveEntityByEntityId::new(entity_id))
    }

    pub fn workflow_state(state: impl Into<String>) -> Self {
        Self::WorkflowState(WorkflowStateFilter::new(state))
    }

    #[must_use]
    pub const fn role(role: EntityRole) -> Self {
        Self::Role(RoleFilter::new(role))
    }

    fn inner(&self) -> &dyn EntityFilter {
        match self {
            Self::RemoveEntityByEntityId(f) => f,
            Self::WorkflowState(f) => f,
            Self::Role(f) => f,
        }
    }
}

impl EntityFilter for Filter {
    fn matches(&self, entity: &dyn EntityFields) -> bool {
        self.inner().matches(entity)
    }

    fn to_query_criteria(&self, collection: Collection) -> QueryCriteria {
        self.inner().to_query_criteria(collection)
    }

    fn to_expression(&self, collection: Collection) -> Expr {
        self.inner().to_expression(collection)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.inner(), f)
    }
}

/// Ordered conjunction of filters
///
/// Evaluation stops at the first rejecting filter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter
    #[must_use]
    pub fn with(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn push(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// The first filter rejecting `entity`, if any
    pub fn first_rejection(&self, entity: &dyn EntityFields) -> Option<&Filter> {
        self.filters.iter().find(|f| !f.matches(entity))
    }

    /// Keep only the entities accepted by every filter, preserving order
    #[must_use]
    pub fn apply(&self, mut entities: EntityMap) -> EntityMap {
        if self.filters.is_empty() {
            return entities;
        }
        entities.retain(|entity| match self.first_rejection(entity) {
            Some(filter) => {
                debug!("Entity {} rejected by {}", entity.entity_id, filter);
                false
            }
            None => true,
        });
        entities
    }
}

impl EntityFilter for FilterSet {
    fn matches(&self, entity: &dyn EntityFields) -> bool {
        self.first_rejection(entity).is_none()
    }

    fn to_query_criteria(&self, collection: Collection) -> QueryCriteria {
        self.filters
            .iter()
            .fold(QueryCriteria::for_collection(collection), |criteria, f| {
                criteria.and_criteria(f.to_query_criteria(collection))
            })
    }

    fn to_expression(&self, collection: Collection) -> Expr {
        Expr::within(
            collection,
            Expr::and(
                self.filters
                    .iter()
                    .map(|f| f.to_expression(collection))
                    .collect(),
            ),
        )
    }
}

impl fmt::Display for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FilterSet -> [")?;
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{filter}")?;
        }
        f.write_str("]")
    }
}

impl FromIterator<Filter> for FilterSet {
    fn from_iter<I: IntoIterator<Item = Filter>>(iter: I) -> Self {
        Self {
            filters: iter.into_iter().collect(),
        }
    }
}
