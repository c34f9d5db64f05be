//! Entity sources: point lookup of one raw record by identifier

use crate::record::RawEntityRecord;
use fedmeta_common::{EntityId, Error, Result};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Loads raw entity records from a backing store
///
/// Implementations perform no caching; every call reads the store again.
pub trait EntitySource: Send + Sync {
    /// Load the record stored for `entity_id`
    ///
    /// Fails with [`Error::EntityNotFound`] when no record exists.
    fn load(&self, entity_id: &EntityId) -> Result<RawEntityRecord>;
}

impl<S: EntitySource + ?Sized> EntitySource for Arc<S> {
    fn load(&self, entity_id: &EntityId) -> Result<RawEntityRecord> {
        (**self).load(entity_id)
    }
}

/// Entity source over a directory of JSON documents
///
/// The record of entity `X` lives at `<dir>/<hex(sha256(X))>.json`, so
/// URL-shaped identifiers map to safe file names.
#[derive(Debug, Clone)]
pub struct DirectoryEntitySource {
    dir: PathBuf,
}

impl DirectoryEntitySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory the records live in
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record file for an entity
    #[must_use]
    pub fn record_path(&self, entity_id: &EntityId) -> PathBuf {
        let digest = Sha256::digest(entity_id.as_str().as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    /// Write (or overwrite) the record file of an entity
    pub fn write(&self, record: &RawEntityRecord) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.record_path(record.entity_id()), record.content())?;
        Ok(())
    }
}

impl EntitySource for DirectoryEntitySource {
    fn load(&self, entity_id: &EntityId) -> Result<RawEntityRecord> {
        let path = self.record_path(entity_id);
        debug!("Loading entity {} from {}", entity_id, path.display());
        match std::fs::read(&path) {
            Ok(content) => Ok(RawEntityRecord::new(entity_id.clone(), content)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::EntityNotFound(entity_id.clone()))
            }
            Err(e) => Err(Error::storage(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_load() {
        let dir = tempdir().unwrap();
        let source = DirectoryEntitySource::new(dir.path());
        let id = EntityId::new_unchecked("https://idp.example.org/metadata");
        source
            .write(&RawEntityRecord::new(id.clone(), b"{}".to_vec()))
            .unwrap();

        let record = source.load(&id).unwrap();
        assert_eq!(record.entity_id(), &id);
        assert_eq!(record.content(), b"{}");
    }

    #[test]
    fn test_record_path_is_hashed() {
        let source = DirectoryEntitySource::new("/md");
        let path = source.record_path(&EntityId::new_unchecked("https://a/b?c"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(name.len(), 64 + ".json".len());
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '.'));
    }

    #[test]
    fn test_missing_record_is_not_found() {
        let dir = tempdir().unwrap();
        let source = DirectoryEntitySource::new(dir.path());
        let err = source.load(&EntityId::new_unchecked("nope")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_empty_record_is_not_a_lookup_failure() {
        let dir = tempdir().unwrap();
        let source = DirectoryEntitySource::new(dir.path());
        let id = EntityId::new_unchecked("empty");
        std::fs::write(source.record_path(&id), b"").unwrap();
        assert!(source.load(&id).unwrap().content().is_empty());
    }
}
