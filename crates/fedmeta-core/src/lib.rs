//! fedmeta Core - metadata filtering and aggregation engine
//!
//! This crate provides:
//! - Entity filters with in-memory, criteria and expression evaluation
//! - The translator from raw records to domain entities
//! - Metadata repositories over the directory and redb stores

pub mod filter;
pub mod repository;
pub mod translator;

pub use filter::{EntityFilter, Filter, FilterSet, RemoveEntityByEntityId, RoleFilter, WorkflowStateFilter};
pub use repository::{
    FetchOutcome, IndexedMetadataRepository, MetadataRepository, SkippedEntity,
    StoreMetadataRepository, open_repository,
};
pub use translator::Translator;
