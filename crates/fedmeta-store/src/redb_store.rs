//! Persistent entity store backed by redb.
//!
//! Summaries are bincode-encoded [`IndexedEntity`] values; records are the
//! raw JSON documents. Enumeration order is key order. The store accepts
//! [`QueryCriteria`] so filtering runs over summaries before any record is
//! read.

use crate::criteria::QueryCriteria;
use crate::index::MetadataIndex;
use crate::record::RawEntityRecord;
use crate::source::EntitySource;
use crate::tables;
use fedmeta_common::{EntityId, Error, IndexedEntity};
use redb::{Database, ReadableTable, ReadableTableMetadata};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Error type for redb store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt summary for '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Storage(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of importing a directory store into redb
#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: usize,
    /// Entities whose record could not be loaded, with the reason
    pub failures: Vec<(EntityId, String)>,
}

impl ImportReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Entity store backed by redb.
pub struct RedbMetadataStore {
    db: Database,
    path: PathBuf,
}

impl std::fmt::Debug for RedbMetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbMetadataStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RedbMetadataStore {
    /// Open (or create) the redb database at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Create tables eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::ENTITY_SUMMARIES)?;
            let _t = write_txn.open_table(tables::ENTITY_RECORDS)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store (or replace) the summary and record of one entity
    pub fn put_entity(&self, summary: &IndexedEntity, record: &RawEntityRecord) -> StoreResult<()> {
        let bytes = bincode::serialize(summary)?;
        let key = summary.entity_id.as_str();
        let write_txn = self.db.begin_write()?;
        {
            let mut summaries = write_txn.open_table(tables::ENTITY_SUMMARIES)?;
            summaries.insert(key, bytes.as_slice())?;
            let mut records = write_txn.open_table(tables::ENTITY_RECORDS)?;
            records.insert(key, record.content())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Remove an entity; returns whether it was present
    pub fn delete_entity(&self, entity_id: &EntityId) -> StoreResult<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut summaries = write_txn.open_table(tables::ENTITY_SUMMARIES)?;
            let mut records = write_txn.open_table(tables::ENTITY_RECORDS)?;
            let had_summary = summaries.remove(entity_id.as_str())?.is_some();
            let had_record = records.remove(entity_id.as_str())?.is_some();
            had_summary || had_record
        };
        write_txn.commit()?;
        Ok(existed)
    }

    /// Number of stored summaries
    pub fn len(&self) -> StoreResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::ENTITY_SUMMARIES)?;
        Ok(table.len()?)
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Build the metadata index from all stored summaries
    ///
    /// A summary that fails to decode fails the whole load.
    pub fn load_index(&self) -> fedmeta_common::Result<MetadataIndex> {
        let location = self.path.display().to_string();
        let entities = self
            .scan_summaries(|_| true)
            .map_err(|e| Error::index_load(&location, e))?;
        let index = MetadataIndex::from_entities(&location, entities)?;
        info!("Loaded metadata index from {} ({} entities)", location, index.len());
        Ok(index)
    }

    /// Summaries admitted by the criteria, in key order
    ///
    /// A summary that fails to decode fails the query with
    /// [`StoreError::Corrupt`].
    pub fn query(&self, criteria: &QueryCriteria) -> StoreResult<Vec<IndexedEntity>> {
        debug!("Executing query: {}", criteria);
        self.scan_summaries(|summary| criteria.admits(summary))
    }

    /// Copy every entity of `index` into this store, loading records from `source`
    ///
    /// Records that cannot be loaded are skipped and listed in the report.
    pub fn import_directory(
        &self,
        index: &MetadataIndex,
        source: &dyn EntitySource,
    ) -> StoreResult<ImportReport> {
        let mut report = ImportReport::default();
        let write_txn = self.db.begin_write()?;
        {
            let mut summaries = write_txn.open_table(tables::ENTITY_SUMMARIES)?;
            let mut records = write_txn.open_table(tables::ENTITY_RECORDS)?;
            for summary in index.entities() {
                let record = match source.load(&summary.entity_id) {
                    Ok(record) => record,
                    Err(e) => {
                        warn!("Skipping entity '{}' during import: {}", summary.entity_id, e);
                        report
                            .failures
                            .push((summary.entity_id.clone(), e.to_string()));
                        continue;
                    }
                };
                let bytes = bincode::serialize(summary)?;
                let key = summary.entity_id.as_str();
                summaries.insert(key, bytes.as_slice())?;
                records.insert(key, record.content())?;
                report.imported += 1;
            }
        }
        write_txn.commit()?;
        info!(
            "Imported {} entities into {} ({} failed)",
            report.imported,
            self.path.display(),
            report.failures.len()
        );
        Ok(report)
    }

    fn scan_summaries(
        &self,
        mut admit: impl FnMut(&IndexedEntity) -> bool,
    ) -> StoreResult<Vec<IndexedEntity>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::ENTITY_SUMMARIES)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            let summary = bincode::deserialize::<IndexedEntity>(entry.1.value()).map_err(|e| {
                let key = entry.0.value().to_string();
                error!("Failed to decode summary '{}': {}", key, e);
                StoreError::Corrupt {
                    key,
                    reason: e.to_string(),
                }
            })?;
            if admit(&summary) {
                result.push(summary);
            }
        }
        Ok(result)
    }
}

impl EntitySource for RedbMetadataStore {
    fn load(&self, entity_id: &EntityId) -> fedmeta_common::Result<RawEntityRecord> {
        let read_txn = self.db.begin_read().map_err(StoreError::from)?;
        let table = read_txn
            .open_table(tables::ENTITY_RECORDS)
            .map_err(StoreError::from)?;
        let content = table
            .get(entity_id.as_str())
            .map_err(StoreError::from)?
            .map(|v| v.value().to_vec())
            .ok_or_else(|| Error::EntityNotFound(entity_id.clone()))?;
        Ok(RawEntityRecord::new(entity_id.clone(), content))
    }
}
