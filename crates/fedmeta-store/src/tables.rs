//! Redb table definitions for persistent metadata storage.

use redb::TableDefinition;

// Key: entity identifier, Value: bincode-encoded IndexedEntity
pub const ENTITY_SUMMARIES: TableDefinition<&str, &[u8]> = TableDefinition::new("entity_summaries");
// Key: entity identifier, Value: raw JSON entity document
pub const ENTITY_RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("entity_records");
