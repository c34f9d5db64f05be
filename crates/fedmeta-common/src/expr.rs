//! Store-agnostic boolean expressions over entity fields
//!
//! An [`Expr`] is the portable form of an entity filter: the in-memory
//! evaluator ([`Expr::evaluate`]) and simple store adapters consume the same
//! tree. Comparisons against a missing field are false for both `Eq` and
//! `Neq`, mirroring SQL NULL handling in query-capable stores.

use crate::types::{DomainEntity, EntityId, EntityRole, IndexedEntity};
use std::fmt;

/// Read access to the fields a filter can reference
pub trait EntityFields {
    fn entity_id(&self) -> &EntityId;

    fn workflow_state(&self) -> Option<&str>;

    fn has_role(&self, role: EntityRole) -> bool;
}

impl EntityFields for IndexedEntity {
    fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    fn workflow_state(&self) -> Option<&str> {
        self.workflow_state.as_deref()
    }

    fn has_role(&self, role: EntityRole) -> bool {
        self.roles.has(role)
    }
}

impl EntityFields for DomainEntity {
    fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    fn workflow_state(&self) -> Option<&str> {
        self.workflow_state.as_deref()
    }

    fn has_role(&self, role: EntityRole) -> bool {
        self.roles.has(role)
    }
}

/// Named entity collection a query is scoped to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Every entity regardless of role
    Entities,
    IdentityProviders,
    ServiceProviders,
}

impl Collection {
    /// Collection name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Entities => "entities",
            Self::IdentityProviders => "identity_providers",
            Self::ServiceProviders => "service_providers",
        }
    }

    /// Alias used to qualify field references
    #[must_use]
    pub const fn alias(&self) -> &'static str {
        match self {
            Self::Entities => "entity",
            Self::IdentityProviders => "idp",
            Self::ServiceProviders => "sp",
        }
    }

    /// Role an entity needs to belong to this collection
    #[must_use]
    pub const fn role(&self) -> Option<EntityRole> {
        match self {
            Self::Entities => None,
            Self::IdentityProviders => Some(EntityRole::IdentityProvider),
            Self::ServiceProviders => Some(EntityRole::ServiceProvider),
        }
    }

    /// Check collection membership
    pub fn contains(&self, entity: &(impl EntityFields + ?Sized)) -> bool {
        self.role().is_none_or(|role| entity.has_role(role))
    }

    /// Membership as an expression; `None` when every entity belongs
    #[must_use]
    pub fn membership(&self) -> Option<Expr> {
        self.role()
            .map(|role| Expr::eq(FieldRef::new(*self, EntityField::Role), role.as_str()))
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Filterable entity field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityField {
    EntityId,
    WorkflowState,
    /// Multi-valued: an entity "equals" every role it has
    Role,
}

impl EntityField {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EntityId => "entity_id",
            Self::WorkflowState => "workflow_state",
            Self::Role => "role",
        }
    }
}

/// Field reference qualified with its collection alias
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub collection: Collection,
    pub field: EntityField,
}

impl FieldRef {
    #[must_use]
    pub const fn new(collection: Collection, field: EntityField) -> Self {
        Self { collection, field }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.collection.alias(), self.field.as_str())
    }
}

/// Comparison operator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Neq,
}

impl CompareOp {
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "<>",
        }
    }

    /// Apply the operator to a possibly missing field value
    #[must_use]
    pub fn apply(&self, actual: Option<&str>, expected: &str) -> bool {
        match (self, actual) {
            (_, None) => false,
            (Self::Eq, Some(actual)) => actual == expected,
            (Self::Neq, Some(actual)) => actual != expected,
        }
    }
}

/// Boolean expression tree
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    True,
    False,
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
    Compare {
        field: FieldRef,
        op: CompareOp,
        value: String,
    },
}

impl Expr {
    /// `field = value`
    pub fn eq(field: FieldRef, value: impl Into<String>) -> Self {
        Self::Compare {
            field,
            op: CompareOp::Eq,
            value: value.into(),
        }
    }

    /// `field <> value`
    pub fn neq(field: FieldRef, value: impl Into<String>) -> Self {
        Self::Compare {
            field,
            op: CompareOp::Neq,
            value: value.into(),
        }
    }

    #[must_use]
    pub const fn and(exprs: Vec<Self>) -> Self {
        Self::And(exprs)
    }

    #[must_use]
    pub const fn or(exprs: Vec<Self>) -> Self {
        Self::Or(exprs)
    }

    #[must_use]
    pub fn negate(expr: Self) -> Self {
        Self::Not(Box::new(expr))
    }

    /// Restrict `expr` to the members of `collection`
    ///
    /// Nested conjunctions are flattened and repeated terms dropped, so
    /// scoping an already scoped expression leaves it unchanged.
    #[must_use]
    pub fn within(collection: Collection, expr: Self) -> Self {
        let mut terms = Vec::new();
        for term in collection.membership().into_iter().chain(expr.conjuncts()) {
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
        match terms.len() {
            0 => Self::True,
            1 => terms.remove(0),
            _ => Self::And(terms),
        }
    }

    fn conjuncts(self) -> Vec<Self> {
        match self {
            Self::True => Vec::new(),
            Self::And(exprs) => exprs.into_iter().flat_map(Self::conjuncts).collect(),
            other => vec![other],
        }
    }

    /// Evaluate against an in-memory entity
    pub fn evaluate(&self, entity: &(impl EntityFields + ?Sized)) -> bool {
        match self {
            Self::True => true,
            Self::False => false,
            Self::And(exprs) => exprs.iter().all(|e| e.evaluate(entity)),
            Self::Or(exprs) => exprs.iter().any(|e| e.evaluate(entity)),
            Self::Not(expr) => !expr.evaluate(entity),
            Self::Compare { field, op, value } => match field.field {
                EntityField::EntityId => op.apply(Some(entity.entity_id().as_str()), value),
                EntityField::WorkflowState => op.apply(entity.workflow_state(), value),
                EntityField::Role => EntityRole::parse(value).is_some_and(|role| match op {
                    CompareOp::Eq => entity.has_role(role),
                    CompareOp::Neq => !entity.has_role(role),
                }),
            },
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, exprs: &[Expr], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, expr) in exprs.iter().enumerate() {
        if i > 0 {
            write!(f, " {sep} ")?;
        }
        write!(f, "{expr}")?;
    }
    f.write_str(")")
}

/// Renders a SQL-style WHERE clause
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => f.write_str("1 = 1"),
            Self::False => f.write_str("1 = 0"),
            Self::And(exprs) if exprs.is_empty() => f.write_str("1 = 1"),
            Self::Or(exprs) if exprs.is_empty() => f.write_str("1 = 0"),
            Self::And(exprs) => write_joined(f, exprs, "AND"),
            Self::Or(exprs) => write_joined(f, exprs, "OR"),
            Self::Not(expr) => write!(f, "NOT ({expr})"),
            Self::Compare { field, op, value } => {
                write!(f, "{field} {} '{}'", op.symbol(), value.replace('\'', "''"))
            }
        }
    }
}
