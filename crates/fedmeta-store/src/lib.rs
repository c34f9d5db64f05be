//! fedmeta Store - metadata index and entity storage
//!
//! Two-tier loading of federation metadata:
//! - [`MetadataIndex`]: per-identifier summaries, built once and shared read-only
//! - [`EntitySource`]: on-demand load of one raw entity record, never cached
//!
//! Two backing stores are provided: a JSON directory store and a redb
//! database that accepts [`QueryCriteria`] for server-side filtering.

pub mod criteria;
pub mod index;
pub mod record;
pub mod redb_store;
pub mod source;
mod tables;

// Re-exports
pub use criteria::{Condition, QueryCriteria};
pub use index::{INDEX_FILE_NAME, MetadataIndex};
pub use record::RawEntityRecord;
pub use redb_store::{ImportReport, RedbMetadataStore, StoreError};
pub use source::{DirectoryEntitySource, EntitySource};
