//! Metadata repositories
//!
//! A repository enumerates the index, loads raw records on demand and
//! translates them. Bulk operations isolate failures per entity: a failed
//! entity is reported to the [`ErrorSink`], recorded as skipped and left
//! out of the result.

use crate::filter::{EntityFilter, FilterSet};
use crate::translator::Translator;
use fedmeta_common::config::{RepositoryConfig, StoreBackend};
use fedmeta_common::{
    Collection, DomainEntity, EntityId, EntityMap, Error, ErrorReport, ErrorSink, IndexedEntity,
    Result,
};
use fedmeta_store::{DirectoryEntitySource, EntitySource, MetadataIndex, RedbMetadataStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

const COMPONENT: &str = "repository";

/// An entity left out of a bulk result
#[derive(Debug)]
pub struct SkippedEntity {
    pub entity_id: EntityId,
    pub error: Error,
}

/// Result of a bulk fetch
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Translated entities in index order
    pub entities: EntityMap,
    pub skipped: Vec<SkippedEntity>,
}

impl FetchOutcome {
    /// True when no entity was skipped
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Read access to the local metadata collection
pub trait MetadataRepository: Send + Sync {
    /// Load and translate one entity; no filters are applied
    fn fetch_entity_by_entity_id(&self, entity_id: &EntityId) -> Result<DomainEntity>;

    /// Every entity of the index, with per-entity failure isolation
    fn fetch_all_entities(&self) -> FetchOutcome;

    /// Entities accepted by every filter of the set
    ///
    /// Selection happens on summaries, before any record is loaded.
    fn find_entities(&self, filters: &FilterSet) -> Result<FetchOutcome>;

    /// The index backing this repository
    fn index(&self) -> &MetadataIndex;
}

/// Index, source and translator shared by both repositories
struct EntityLoader<S> {
    index: Arc<MetadataIndex>,
    source: S,
    translator: Translator,
    sink: Arc<dyn ErrorSink>,
}

impl<S: EntitySource> EntityLoader<S> {
    fn new(index: MetadataIndex, source: S, sink: Arc<dyn ErrorSink>) -> Self {
        let index = Arc::new(index);
        Self {
            translator: Translator::new(Arc::clone(&index)),
            index,
            source,
            sink,
        }
    }

    fn fetch_one(&self, entity_id: &EntityId) -> Result<DomainEntity> {
        let record = self.source.load(entity_id)?;
        self.translator.translate(&record, None)
    }

    fn load_summaries<'a>(&self, summaries: impl IntoIterator<Item = &'a IndexedEntity>) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();
        for summary in summaries {
            let result = self
                .source
                .load(&summary.entity_id)
                .and_then(|record| self.translator.translate(&record, Some(summary)));
            match result {
                Ok(entity) => {
                    outcome.entities.insert(entity);
                }
                Err(error) => {
                    warn!("Skipping entity {}: {}", summary.entity_id, error);
                    self.sink.report(ErrorReport::new(
                        COMPONENT,
                        Some(&summary.entity_id),
                        &error,
                    ));
                    outcome.skipped.push(SkippedEntity {
                        entity_id: summary.entity_id.clone(),
                        error,
                    });
                }
            }
        }
        debug!(
            "Loaded {} entities ({} skipped)",
            outcome.entities.len(),
            outcome.skipped.len()
        );
        outcome
    }
}

/// Repository over an in-memory index, selecting with filter expressions
pub struct IndexedMetadataRepository<S = DirectoryEntitySource> {
    loader: EntityLoader<S>,
}

impl IndexedMetadataRepository<DirectoryEntitySource> {
    /// Open the JSON directory store at `metadata_dir`
    ///
    /// Fails with [`Error::IndexLoad`] when the index cannot be read.
    pub fn open(metadata_dir: impl AsRef<Path>, sink: Arc<dyn ErrorSink>) -> Result<Self> {
        let dir = metadata_dir.as_ref();
        let index = MetadataIndex::load(dir)?;
        Ok(Self::new(index, DirectoryEntitySource::new(dir), sink))
    }
}

impl<S: EntitySource> IndexedMetadataRepository<S> {
    pub fn new(index: MetadataIndex, source: S, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            loader: EntityLoader::new(index, source, sink),
        }
    }
}

impl<S: EntitySource> MetadataRepository for IndexedMetadataRepository<S> {
    fn fetch_entity_by_entity_id(&self, entity_id: &EntityId) -> Result<DomainEntity> {
        self.loader.fetch_one(entity_id)
    }

    fn fetch_all_entities(&self) -> FetchOutcome {
        self.loader.load_summaries(self.loader.index.entities())
    }

    fn find_entities(&self, filters: &FilterSet) -> Result<FetchOutcome> {
        let expr = filters.to_expression(Collection::Entities);
        debug!("Selecting entities where {}", expr);
        Ok(self.loader.load_summaries(self.loader.index.select(&expr)))
    }

    fn index(&self) -> &MetadataIndex {
        &self.loader.index
    }
}

/// Repository over the redb store, selecting with compiled query criteria
///
/// The summaries are read once at construction and criteria run against
/// that snapshot; later writes to the store are not visible.
pub struct StoreMetadataRepository {
    loader: EntityLoader<Arc<RedbMetadataStore>>,
}

impl StoreMetadataRepository {
    /// Build the index from the store's summaries
    pub fn new(store: Arc<RedbMetadataStore>, sink: Arc<dyn ErrorSink>) -> Result<Self> {
        let index = store.load_index()?;
        Ok(Self {
            loader: EntityLoader::new(index, store, sink),
        })
    }

    /// Open the redb database at `path`
    pub fn open(path: impl AsRef<Path>, sink: Arc<dyn ErrorSink>) -> Result<Self> {
        let store = RedbMetadataStore::open(path)?;
        Self::new(Arc::new(store), sink)
    }
}

impl MetadataRepository for StoreMetadataRepository {
    fn fetch_entity_by_entity_id(&self, entity_id: &EntityId) -> Result<DomainEntity> {
        self.loader.fetch_one(entity_id)
    }

    fn fetch_all_entities(&self) -> FetchOutcome {
        self.loader.load_summaries(self.loader.index.entities())
    }

    fn find_entities(&self, filters: &FilterSet) -> Result<FetchOutcome> {
        let criteria = filters.to_query_criteria(Collection::Entities);
        debug!("Executing query: {}", criteria);
        Ok(self.loader.load_summaries(self.loader.index.query(&criteria)))
    }

    fn index(&self) -> &MetadataIndex {
        &self.loader.index
    }
}

/// Build the repository selected by the configuration
pub fn open_repository(
    config: &RepositoryConfig,
    sink: Arc<dyn ErrorSink>,
) -> Result<Box<dyn MetadataRepository>> {
    match &config.backend {
        StoreBackend::Files => {
            info!(
                "Opening metadata directory {}",
                config.metadata_dir.display()
            );
            Ok(Box::new(IndexedMetadataRepository::open(
                &config.metadata_dir,
                sink,
            )?))
        }
        StoreBackend::Redb { path } => {
            info!("Opening metadata database {}", path.display());
            Ok(Box::new(StoreMetadataRepository::open(path, sink)?))
        }
    }
}
