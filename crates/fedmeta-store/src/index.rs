//! Process-lifetime metadata index
//!
//! The index maps every known entity identifier to a lightweight
//! [`IndexedEntity`] summary. It is built exactly once from its source and
//! never refreshed; filters run against the summaries so full records are
//! only loaded for entities that survive filtering.
//!
//! On-disk form (`metadata.index.json`):
//!
//! ```json
//! {
//!   "processed": 1700000000,
//!   "entities": [
//!     { "entity_id": "https://idp.example.org", "roles": ["idp"],
//!       "workflow_state": "prodaccepted", "modified": 1700000000 }
//!   ]
//! }
//! ```

use crate::criteria::QueryCriteria;
use fedmeta_common::{EntityId, EntityRole, Error, Expr, IndexedEntity, Result, RoleFlags};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// File name of the index inside a metadata directory
pub const INDEX_FILE_NAME: &str = "metadata.index.json";

#[derive(Debug, Deserialize)]
struct IndexFile {
    #[serde(default)]
    processed: Option<u64>,
    entities: Vec<IndexFileEntry>,
}

#[derive(Debug, Deserialize)]
struct IndexFileEntry {
    entity_id: String,
    roles: Vec<EntityRole>,
    #[serde(default)]
    workflow_state: Option<String>,
    #[serde(default)]
    modified: Option<u64>,
    #[serde(default)]
    display_name: Option<String>,
}

/// Read-only index of entity summaries in store enumeration order
#[derive(Debug, Clone)]
pub struct MetadataIndex {
    entities: Vec<IndexedEntity>,
    positions: HashMap<EntityId, usize>,
    processed: Option<u64>,
}

impl MetadataIndex {
    /// Load the index from a metadata directory
    ///
    /// Any unreadable or malformed content fails the whole load; there is no
    /// partial index.
    pub fn load(metadata_dir: impl AsRef<Path>) -> Result<Self> {
        let path = metadata_dir.as_ref().join(INDEX_FILE_NAME);
        let location = path.display().to_string();

        let contents =
            std::fs::read_to_string(&path).map_err(|e| Error::index_load(&location, e))?;
        let file: IndexFile =
            serde_json::from_str(&contents).map_err(|e| Error::index_load(&location, e))?;

        let mut entities = Vec::with_capacity(file.entities.len());
        for entry in file.entities {
            let entity_id =
                EntityId::new(entry.entity_id).map_err(|e| Error::index_load(&location, e))?;
            let mut summary = IndexedEntity::new(entity_id, RoleFlags::from_roles(&entry.roles));
            summary.workflow_state = entry.workflow_state;
            summary.modified = entry.modified;
            summary.display_name = entry.display_name;
            entities.push(summary);
        }

        let mut index = Self::from_entities(&location, entities)?;
        index.processed = file.processed;
        info!("Loaded metadata index from {} ({} entities)", location, index.len());
        Ok(index)
    }

    /// Build an index from summaries already in enumeration order
    ///
    /// `location` only labels errors.
    pub fn from_entities(location: &str, entities: Vec<IndexedEntity>) -> Result<Self> {
        let mut positions = HashMap::with_capacity(entities.len());
        for (pos, entity) in entities.iter().enumerate() {
            if entity.roles.is_empty() {
                return Err(Error::index_load(
                    location,
                    format!("entity {} declares no role", entity.entity_id),
                ));
            }
            if positions.insert(entity.entity_id.clone(), pos).is_some() {
                return Err(Error::index_load(
                    location,
                    format!("duplicate entity {}", entity.entity_id),
                ));
            }
        }

        Ok(Self {
            entities,
            positions,
            processed: None,
        })
    }

    /// All summaries in enumeration order
    #[must_use]
    pub fn entities(&self) -> &[IndexedEntity] {
        &self.entities
    }

    /// Look up the summary of one entity
    pub fn get(&self, entity_id: &str) -> Result<&IndexedEntity> {
        self.positions
            .get(entity_id)
            .map(|&pos| &self.entities[pos])
            .ok_or_else(|| Error::EntityNotFound(EntityId::new_unchecked(entity_id)))
    }

    #[must_use]
    pub fn contains(&self, entity_id: &str) -> bool {
        self.positions.contains_key(entity_id)
    }

    /// Summaries matching an expression, in enumeration order
    #[must_use]
    pub fn select(&self, expr: &Expr) -> Vec<&IndexedEntity> {
        self.entities.iter().filter(|e| expr.evaluate(*e)).collect()
    }

    /// Summaries admitted by store criteria, in enumeration order
    #[must_use]
    pub fn query(&self, criteria: &QueryCriteria) -> Vec<&IndexedEntity> {
        self.entities.iter().filter(|e| criteria.admits(*e)).collect()
    }

    /// Timestamp the index was generated at, when recorded
    #[must_use]
    pub const fn processed(&self) -> Option<u64> {
        self.processed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedmeta_common::{Collection, CompareOp, EntityField, FieldRef};
    use tempfile::tempdir;

    fn write_index(dir: &Path, json: &str) {
        std::fs::write(dir.join(INDEX_FILE_NAME), json).unwrap();
    }

    #[test]
    fn test_load_preserves_order() {
        let dir = tempdir().unwrap();
        write_index(
            dir.path(),
            r#"{"processed": 42, "entities": [
                {"entity_id": "https://sp.example.org", "roles": ["sp"], "workflow_state": "prodaccepted"},
                {"entity_id": "https://idp.example.org", "roles": ["idp", "sp"], "modified": 7}
            ]}"#,
        );

        let index = MetadataIndex::load(dir.path()).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.processed(), Some(42));
        let ids: Vec<&str> = index.entities().iter().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["https://sp.example.org", "https://idp.example.org"]);

        let idp = index.get("https://idp.example.org").unwrap();
        assert!(idp.is_identity_provider());
        assert!(idp.is_service_provider());
        assert_eq!(idp.modified, Some(7));
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let index = MetadataIndex::from_entities("test", Vec::new()).unwrap();
        assert!(index.get("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_missing_index_file() {
        let dir = tempdir().unwrap();
        let err = MetadataIndex::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::IndexLoad { .. }));
    }

    #[test]
    fn test_malformed_index_is_fatal() {
        let dir = tempdir().unwrap();
        write_index(dir.path(), r#"{"entities": [{"entity_id": 12}]}"#);
        assert!(matches!(
            MetadataIndex::load(dir.path()),
            Err(Error::IndexLoad { .. })
        ));
    }

    #[test]
    fn test_duplicate_and_roleless_entries_rejected() {
        let dir = tempdir().unwrap();
        write_index(
            dir.path(),
            r#"{"entities": [
                {"entity_id": "a", "roles": ["idp"]},
                {"entity_id": "a", "roles": ["sp"]}
            ]}"#,
        );
        assert!(matches!(
            MetadataIndex::load(dir.path()),
            Err(Error::IndexLoad { .. })
        ));

        write_index(dir.path(), r#"{"entities": [{"entity_id": "a", "roles": []}]}"#);
        assert!(matches!(
            MetadataIndex::load(dir.path()),
            Err(Error::IndexLoad { .. })
        ));
    }

    #[test]
    fn test_select_by_expression() {
        let index = MetadataIndex::from_entities(
            "test",
            vec![
                IndexedEntity::new(EntityId::new_unchecked("a"), RoleFlags::IDP)
                    .with_workflow_state("prodaccepted"),
                IndexedEntity::new(EntityId::new_unchecked("b"), RoleFlags::SP)
                    .with_workflow_state("testaccepted"),
                IndexedEntity::new(EntityId::new_unchecked("c"), RoleFlags::SP)
                    .with_workflow_state("prodaccepted"),
            ],
        )
        .unwrap();

        let state = FieldRef::new(Collection::Entities, EntityField::WorkflowState);
        let selected: Vec<&str> = index
            .select(&Expr::eq(state, "prodaccepted"))
            .iter()
            .map(|e| e.entity_id.as_str())
            .collect();
        assert_eq!(selected, vec!["a", "c"]);

        let criteria = QueryCriteria::for_collection(Collection::ServiceProviders).and_where(
            EntityField::WorkflowState,
            CompareOp::Eq,
            "prodaccepted",
        );
        let queried: Vec<&str> = index
            .query(&criteria)
            .iter()
            .map(|e| e.entity_id.as_str())
            .collect();
        assert_eq!(queried, vec!["c"]);
    }
}
