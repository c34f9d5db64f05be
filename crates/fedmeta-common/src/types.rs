//! Core type definitions for fedmeta
//!
//! This module defines the entity model shared by every component:
//! identifiers, role flags, index summaries, translated domain entities
//! and the insertion-ordered [`EntityMap`] used for multi-entity results.

use derive_more::Display;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Unique identifier of one federation participant
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{_0}")]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Create a new entity identifier (must be non-empty)
    pub fn new(id: impl Into<String>) -> Result<Self, EntityIdError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(EntityIdError::Empty);
        }
        Ok(Self(id))
    }

    /// Create without validation (internal use only)
    #[must_use]
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Entity identifier validation error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntityIdError {
    #[error("entity identifier must not be empty")]
    Empty,
}

/// Role a federation participant plays
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRole {
    #[serde(rename = "idp")]
    IdentityProvider,
    #[serde(rename = "sp")]
    ServiceProvider,
}

impl EntityRole {
    /// Short role name ("idp" / "sp")
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::IdentityProvider => "idp",
            Self::ServiceProvider => "sp",
        }
    }

    /// Parse from the short role name
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idp" => Some(Self::IdentityProvider),
            "sp" => Some(Self::ServiceProvider),
            _ => None,
        }
    }
}

impl fmt::Display for EntityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role flags of an entity; a SAML entity may be both IdP and SP
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleFlags {
    pub identity_provider: bool,
    pub service_provider: bool,
}

impl RoleFlags {
    /// Flags for an identity provider only
    pub const IDP: Self = Self {
        identity_provider: true,
        service_provider: false,
    };

    /// Flags for a service provider only
    pub const SP: Self = Self {
        identity_provider: false,
        service_provider: true,
    };

    /// Build flags from a list of roles
    #[must_use]
    pub fn from_roles(roles: &[EntityRole]) -> Self {
        let mut flags = Self::default();
        for role in roles {
            flags.set(*role);
        }
        flags
    }

    /// Set a role flag
    pub const fn set(&mut self, role: EntityRole) {
        match role {
            EntityRole::IdentityProvider => self.identity_provider = true,
            EntityRole::ServiceProvider => self.service_provider = true,
        }
    }

    /// Check whether the role is present
    #[must_use]
    pub const fn has(&self, role: EntityRole) -> bool {
        match role {
            EntityRole::IdentityProvider => self.identity_provider,
            EntityRole::ServiceProvider => self.service_provider,
        }
    }

    /// True when no role is set
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.identity_provider && !self.service_provider
    }

    /// Present roles, IdP first
    #[must_use]
    pub fn roles(&self) -> Vec<EntityRole> {
        let mut roles = Vec::with_capacity(2);
        if self.identity_provider {
            roles.push(EntityRole::IdentityProvider);
        }
        if self.service_provider {
            roles.push(EntityRole::ServiceProvider);
        }
        roles
    }
}

/// Lightweight per-identifier summary held by the metadata index
///
/// Carries enough to filter an entity without loading its full record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedEntity {
    pub entity_id: EntityId,
    pub roles: RoleFlags,
    pub workflow_state: Option<String>,
    /// Last-modified marker (unix seconds)
    pub modified: Option<u64>,
    pub display_name: Option<String>,
}

impl IndexedEntity {
    /// Create a summary with the given roles
    #[must_use]
    pub const fn new(entity_id: EntityId, roles: RoleFlags) -> Self {
        Self {
            entity_id,
            roles,
            workflow_state: None,
            modified: None,
            display_name: None,
        }
    }

    /// Set workflow state
    #[must_use]
    pub fn with_workflow_state(mut self, state: impl Into<String>) -> Self {
        self.workflow_state = Some(state.into());
        self
    }

    /// Set last-modified marker
    #[must_use]
    pub const fn with_modified(mut self, modified: u64) -> Self {
        self.modified = Some(modified);
        self
    }

    /// Set display name
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    #[must_use]
    pub const fn is_identity_provider(&self) -> bool {
        self.roles.identity_provider
    }

    #[must_use]
    pub const fn is_service_provider(&self) -> bool {
        self.roles.service_provider
    }
}

/// A protocol endpoint (binding + location)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub binding: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

impl Endpoint {
    pub fn new(binding: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            binding: binding.into(),
            location: location.into(),
            index: None,
        }
    }

    #[must_use]
    pub const fn with_index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }
}

/// Role requirement violations of a domain entity
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoleRequirementError {
    #[error("entity declares no role")]
    NoRole,
    #[error("identity provider has no single sign-on endpoint")]
    MissingSingleSignOnService,
    #[error("service provider has no assertion consumer endpoint")]
    MissingAssertionConsumerService,
}

/// Translated, consumer-facing federation entity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEntity {
    pub entity_id: EntityId,
    pub roles: RoleFlags,
    pub workflow_state: Option<String>,
    /// Display names keyed by language
    pub names: BTreeMap<String, String>,
    pub single_sign_on_services: Vec<Endpoint>,
    pub assertion_consumer_services: Vec<Endpoint>,
    pub certificates: Vec<String>,
    /// Access flag set by a policy adapter; `None` until marked
    pub access: Option<bool>,
}

impl DomainEntity {
    /// Create an empty entity with the given roles
    #[must_use]
    pub const fn new(entity_id: EntityId, roles: RoleFlags) -> Self {
        Self {
            entity_id,
            roles,
            workflow_state: None,
            names: BTreeMap::new(),
            single_sign_on_services: Vec::new(),
            assertion_consumer_services: Vec::new(),
            certificates: Vec::new(),
            access: None,
        }
    }

    #[must_use]
    pub fn with_workflow_state(mut self, state: impl Into<String>) -> Self {
        self.workflow_state = Some(state.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, lang: impl Into<String>, name: impl Into<String>) -> Self {
        self.names.insert(lang.into(), name.into());
        self
    }

    #[must_use]
    pub fn with_single_sign_on_service(mut self, endpoint: Endpoint) -> Self {
        self.single_sign_on_services.push(endpoint);
        self
    }

    #[must_use]
    pub fn with_assertion_consumer_service(mut self, endpoint: Endpoint) -> Self {
        self.assertion_consumer_services.push(endpoint);
        self
    }

    #[must_use]
    pub fn with_certificate(mut self, certificate: impl Into<String>) -> Self {
        self.certificates.push(certificate.into());
        self
    }

    #[must_use]
    pub const fn is_identity_provider(&self) -> bool {
        self.roles.identity_provider
    }

    #[must_use]
    pub const fn is_service_provider(&self) -> bool {
        self.roles.service_provider
    }

    /// Verify that each declared role carries the endpoints it needs
    pub fn check_role_requirements(&self) -> Result<(), RoleRequirementError> {
        if self.roles.is_empty() {
            return Err(RoleRequirementError::NoRole);
        }
        if self.roles.identity_provider && self.single_sign_on_services.is_empty() {
            return Err(RoleRequirementError::MissingSingleSignOnService);
        }
        if self.roles.service_provider && self.assertion_consumer_services.is_empty() {
            return Err(RoleRequirementError::MissingAssertionConsumerService);
        }
        Ok(())
    }
}

/// Insertion-ordered mapping from entity identifier to domain entity
///
/// Iteration follows insertion order. Identifiers of stored entities must
/// not be changed through [`EntityMap::iter_mut`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityMap {
    entries: Vec<DomainEntity>,
    positions: HashMap<EntityId, usize>,
}

impl EntityMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
        }
    }

    /// Insert an entity, replacing (in place) any entity with the same identifier
    pub fn insert(&mut self, entity: DomainEntity) -> Option<DomainEntity> {
        if let Some(&pos) = self.positions.get(&entity.entity_id) {
            return Some(std::mem::replace(&mut self.entries[pos], entity));
        }
        self.positions
            .insert(entity.entity_id.clone(), self.entries.len());
        self.entries.push(entity);
        None
    }

    /// Insert only when the identifier is not present yet; returns whether it was inserted
    pub fn insert_absent(&mut self, entity: DomainEntity) -> bool {
        if self.positions.contains_key(&entity.entity_id) {
            return false;
        }
        self.insert(entity);
        true
    }

    #[must_use]
    pub fn get(&self, entity_id: &str) -> Option<&DomainEntity> {
        self.positions.get(entity_id).map(|&pos| &self.entries[pos])
    }

    #[must_use]
    pub fn contains(&self, entity_id: &str) -> bool {
        self.positions.contains_key(entity_id)
    }

    /// Remove an entity, keeping the order of the remaining ones
    pub fn remove(&mut self, entity_id: &str) -> Option<DomainEntity> {
        let pos = self.positions.remove(entity_id)?;
        let removed = self.entries.remove(pos);
        self.reindex();
        Some(removed)
    }

    /// Keep only the entities for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(&DomainEntity) -> bool) {
        let before = self.entries.len();
        self.entries.retain(|entity| keep(entity));
        if self.entries.len() != before {
            self.reindex();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DomainEntity> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, DomainEntity> {
        self.entries.iter_mut()
    }

    /// Identifiers in insertion order
    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.entries.iter().map(|e| &e.entity_id)
    }

    fn reindex(&mut self) {
        self.positions.clear();
        for (pos, entity) in self.entries.iter().enumerate() {
            self.positions.insert(entity.entity_id.clone(), pos);
        }
    }
}

impl FromIterator<DomainEntity> for EntityMap {
    fn from_iter<I: IntoIterator<Item = DomainEntity>>(iter: I) -> Self {
        let mut map = Self::new();
        for entity in iter {
            map.insert(entity);
        }
        map
    }
}

impl Extend<DomainEntity> for EntityMap {
    fn extend<I: IntoIterator<Item = DomainEntity>>(&mut self, iter: I) {
        for entity in iter {
            self.insert(entity);
        }
    }
}

impl IntoIterator for EntityMap {
    type Item = DomainEntity;
    type IntoIter = std::vec::IntoIter<DomainEntity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a EntityMap {
    type Item = &'a DomainEntity;
    type IntoIter = std::slice::Iter<'a, DomainEntity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl Serialize for EntityMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entity in &self.entries {
            map.serialize_entry(entity.entity_id.as_str(), entity)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idp(id: &str) -> DomainEntity {
        DomainEntity::new(EntityId::new_unchecked(id), RoleFlags::IDP)
            .with_single_sign_on_service(Endpoint::new("redirect", "https://idp/sso"))
    }

    #[test]
    fn test_entity_id_rejects_empty() {
        assert_eq!(EntityId::new("  "), Err(EntityIdError::Empty));
        assert_eq!(
            EntityId::new("https://idp.example.org").unwrap().as_str(),
            "https://idp.example.org"
        );
    }

    #[test]
    fn test_entity_id_deserialize_validates() {
        let result: Result<EntityId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_role_flags() {
        let flags = RoleFlags::from_roles(&[EntityRole::ServiceProvider, EntityRole::IdentityProvider]);
        assert!(flags.has(EntityRole::IdentityProvider));
        assert!(flags.has(EntityRole::ServiceProvider));
        assert_eq!(
            flags.roles(),
            vec![EntityRole::IdentityProvider, EntityRole::ServiceProvider]
        );
        assert!(RoleFlags::default().is_empty());
    }

    #[test]
    fn test_role_requirements() {
        let bare = DomainEntity::new(EntityId::new_unchecked("a"), RoleFlags::IDP);
        assert_eq!(
            bare.check_role_requirements(),
            Err(RoleRequirementError::MissingSingleSignOnService)
        );
        assert!(idp("a").check_role_requirements().is_ok());

        let sp = DomainEntity::new(EntityId::new_unchecked("b"), RoleFlags::SP);
        assert_eq!(
            sp.check_role_requirements(),
            Err(RoleRequirementError::MissingAssertionConsumerService)
        );
    }

    #[test]
    fn test_entity_map_keeps_insertion_order() {
        let mut map = EntityMap::new();
        map.insert(idp("c"));
        map.insert(idp("a"));
        map.insert(idp("b"));
        let ids: Vec<&str> = map.ids().map(EntityId::as_str).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);

        map.remove("a");
        let ids: Vec<&str> = map.ids().map(EntityId::as_str).collect();
        assert_eq!(ids, vec!["c", "b"]);
        assert!(map.get("b").is_some());
        assert!(!map.contains("a"));
    }

    #[test]
    fn test_entity_map_replace_in_place() {
        let mut map = EntityMap::new();
        map.insert(idp("a"));
        map.insert(idp("b"));
        let old = map.insert(idp("a").with_workflow_state("prodaccepted"));
        assert!(old.is_some());
        assert_eq!(map.len(), 2);
        assert_eq!(map.iter().next().unwrap().workflow_state.as_deref(), Some("prodaccepted"));

        assert!(!map.insert_absent(idp("b")));
        assert!(map.insert_absent(idp("d")));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_entity_map_retain_reindexes() {
        let mut map: EntityMap = ["a", "b", "c"].into_iter().map(idp).collect();
        map.retain(|e| e.entity_id.as_str() != "a");
        assert_eq!(map.get("c").unwrap().entity_id.as_str(), "c");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_entity_map_serializes_as_ordered_object() {
        let map: EntityMap = ["z", "a"].into_iter().map(idp).collect();
        let json = serde_json::to_string(&map).unwrap();
        assert!(json.find("\"z\"").unwrap() < json.find("\"a\"").unwrap());
    }
}
