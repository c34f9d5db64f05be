//! Raw record to domain entity translation
//!
//! Role flags and workflow state come from the index summary; names,
//! endpoints and certificates come from the stored document.

use fedmeta_common::{DomainEntity, Endpoint, Error, IndexedEntity, Result};
use fedmeta_store::{MetadataIndex, RawEntityRecord};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Stored entity document
#[derive(Debug, Deserialize)]
struct StoredEntityDocument {
    entity_id: String,
    #[serde(default)]
    names: BTreeMap<String, String>,
    #[serde(default)]
    single_sign_on_services: Vec<Endpoint>,
    #[serde(default)]
    assertion_consumer_services: Vec<Endpoint>,
    #[serde(default)]
    certificates: Vec<String>,
}

/// Converts raw records into domain entities
#[derive(Debug, Clone)]
pub struct Translator {
    index: Arc<MetadataIndex>,
}

impl Translator {
    #[must_use]
    pub const fn new(index: Arc<MetadataIndex>) -> Self {
        Self { index }
    }

    /// Translate one record
    ///
    /// Without `summary`, the summary is looked up in the index by the
    /// record's identifier. Every call produces a fresh entity.
    pub fn translate(
        &self,
        record: &RawEntityRecord,
        summary: Option<&IndexedEntity>,
    ) -> Result<DomainEntity> {
        let entity_id = record.entity_id();
        let summary = match summary {
            Some(summary) => summary,
            None => self
                .index
                .get(entity_id.as_str())
                .map_err(|_| Error::translation(entity_id, "no index summary for entity"))?,
        };
        if &summary.entity_id != entity_id {
            return Err(Error::translation(
                entity_id,
                format!("summary belongs to {}", summary.entity_id),
            ));
        }

        let document: StoredEntityDocument = serde_json::from_slice(record.content())
            .map_err(|e| Error::translation(entity_id, format!("invalid entity document: {e}")))?;
        if document.entity_id != entity_id.as_str() {
            return Err(Error::translation(
                entity_id,
                format!("document declares entity {}", document.entity_id),
            ));
        }

        let entity = DomainEntity {
            entity_id: entity_id.clone(),
            roles: summary.roles,
            workflow_state: summary.workflow_state.clone(),
            names: document.names,
            single_sign_on_services: document.single_sign_on_services,
            assertion_consumer_services: document.assertion_consumer_services,
            certificates: document.certificates,
            access: None,
        };
        entity
            .check_role_requirements()
            .map_err(|e| Error::translation(entity_id, e))?;

        debug!("Translated entity {}", entity_id);
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedmeta_common::{EntityId, RoleFlags};

    fn translator(summaries: Vec<IndexedEntity>) -> Translator {
        Translator::new(Arc::new(
            MetadataIndex::from_entities("test", summaries).unwrap(),
        ))
    }

    fn idp_summary() -> IndexedEntity {
        IndexedEntity::new(EntityId::new_unchecked("https://idp"), RoleFlags::IDP)
            .with_workflow_state("production")
    }

    fn record(id: &str, json: &str) -> RawEntityRecord {
        RawEntityRecord::new(EntityId::new_unchecked(id), json.as_bytes().to_vec())
    }

    const IDP_DOC: &str = r#"{
        "entity_id": "https://idp",
        "names": {"en": "Example IdP"},
        "single_sign_on_services": [{"binding": "redirect", "location": "https://idp/sso"}],
        "certificates": ["MIIC"]
    }"#;

    #[test]
    fn test_translate_with_index_lookup() {
        let translator = translator(vec![idp_summary()]);
        let entity = translator.translate(&record("https://idp", IDP_DOC), None).unwrap();

        assert_eq!(entity.entity_id.as_str(), "https://idp");
        assert!(entity.is_identity_provider());
        assert_eq!(entity.workflow_state.as_deref(), Some("production"));
        assert_eq!(entity.names["en"], "Example IdP");
        assert_eq!(entity.single_sign_on_services[0].location, "https://idp/sso");
        assert_eq!(entity.certificates, vec!["MIIC".to_string()]);
        assert_eq!(entity.access, None);
    }

    #[test]
    fn test_explicit_summary_wins_over_index() {
        let translator = translator(Vec::new());
        let summary = idp_summary().with_workflow_state("draft");
        let entity = translator
            .translate(&record("https://idp", IDP_DOC), Some(&summary))
            .unwrap();
        assert_eq!(entity.workflow_state.as_deref(), Some("draft"));
    }

    #[test]
    fn test_translation_failures() {
        let translator = translator(vec![idp_summary()]);

        let malformed = translator.translate(&record("https://idp", "{not json"), None);
        assert!(matches!(malformed, Err(Error::Translation { .. })));

        let unindexed = translator.translate(&record("https://other", IDP_DOC), None);
        assert!(matches!(unindexed, Err(Error::Translation { .. })));

        let wrong_id = translator.translate(
            &record("https://idp", r#"{"entity_id": "https://elsewhere"}"#),
            None,
        );
        assert!(matches!(wrong_id, Err(Error::Translation { .. })));

        let mismatched_summary = IndexedEntity::new(EntityId::new_unchecked("https://x"), RoleFlags::IDP);
        let result = translator.translate(&record("https://idp", IDP_DOC), Some(&mismatched_summary));
        assert!(matches!(result, Err(Error::Translation { .. })));
    }

    #[test]
    fn test_role_requirements_enforced() {
        let translator = translator(vec![idp_summary()]);
        let result = translator.translate(&record("https://idp", r#"{"entity_id": "https://idp"}"#), None);
        let Err(Error::Translation { reason, .. }) = result else {
            panic!("expected translation error");
        };
        assert!(reason.contains("single sign-on"));
    }
}
