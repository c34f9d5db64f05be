//! Policy adapters
//!
//! A policy adapter narrows or annotates an already aggregated entity
//! collection using remote access-control and workflow information.
//! Access decisions are never cached; every call asks the registry again.

use crate::arp::AttributeReleasePolicy;
use crate::client::{RegistryClient, RemoteListing, RestRegistryClient};
use crate::error::RegistryResult;
use crate::fixed::FixedPolicyAdapter;
use crate::keyvalue::KeyValueMapper;
use async_trait::async_trait;
use fedmeta_common::{
    Config, DomainEntity, EntityId, EntityMap, EntityRole, Error, ErrorReport, ErrorSink, Result,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

const COMPONENT: &str = "registry";

/// Remote access-control and workflow contract
#[async_trait]
pub trait PolicyAdapter: Send + Sync {
    /// Adapter name for logging
    fn name(&self) -> &str;

    /// Drop identity providers the service provider may not use
    ///
    /// Kept identity providers get `access = Some(true)`; other entities
    /// pass through unchanged.
    async fn filter_entities_by_sp(
        &self,
        entities: EntityMap,
        sp_entity_id: &EntityId,
    ) -> Result<EntityMap>;

    /// Set `access` on every identity provider; nothing is removed
    async fn mark_entities_by_sp(
        &self,
        entities: EntityMap,
        sp_entity_id: &EntityId,
    ) -> Result<EntityMap>;

    /// Keep only entities whose workflow state equals `workflow_state`
    async fn filter_entities_by_workflow_state(
        &self,
        mut entities: EntityMap,
        workflow_state: &str,
    ) -> Result<EntityMap> {
        entities.retain(|e| e.workflow_state.as_deref() == Some(workflow_state));
        Ok(entities)
    }

    async fn is_connection_allowed(
        &self,
        sp_entity_id: &EntityId,
        idp_entity_id: &EntityId,
    ) -> Result<bool>;

    /// Union of the remote service provider and identity provider listings
    async fn get_remote_metadata(&self) -> Result<EntityMap>;

    async fn get_entity(&self, entity_id: &EntityId) -> Result<DomainEntity>;

    async fn get_arp(&self, sp_entity_id: &EntityId) -> Result<Option<AttributeReleasePolicy>>;

    /// Health check for the policy backend
    async fn health_check(&self) -> bool {
        true // Default: always healthy
    }
}

/// Policy adapter backed by a remote service registry
pub struct RegistryPolicyAdapter<C> {
    client: C,
    mapper: KeyValueMapper,
    sink: Arc<dyn ErrorSink>,
}

impl<C: RegistryClient> RegistryPolicyAdapter<C> {
    pub fn new(client: C, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            client,
            mapper: KeyValueMapper::new(),
            sink,
        }
    }

    async fn allowed_idps(&self, sp_entity_id: &EntityId) -> RegistryResult<HashSet<String>> {
        let allowed = self.client.allowed_idps(sp_entity_id).await?;
        debug!(
            "Registry allows {} identity providers for {}",
            allowed.len(),
            sp_entity_id
        );
        Ok(allowed.into_iter().collect())
    }

    /// Map every listing entry, reporting and skipping the ones that fail
    fn map_listing(&self, listing: RemoteListing, role: EntityRole, into: &mut EntityMap) {
        for (entity_id, payload) in listing {
            match self.mapper.map(&entity_id, Some(role), &payload) {
                Ok(entity) => {
                    if !into.insert_absent(entity) {
                        debug!("Keeping earlier listing entry for {}", entity_id);
                    }
                }
                Err(e) => {
                    warn!("Skipping remote {} entry {}: {}", role, entity_id, e);
                    let id = EntityId::new(entity_id.as_str()).ok();
                    let error = Error::from(e);
                    self.sink
                        .report(ErrorReport::new(COMPONENT, id.as_ref(), &error));
                }
            }
        }
    }
}

#[async_trait]
impl<C: RegistryClient> PolicyAdapter for RegistryPolicyAdapter<C> {
    fn name(&self) -> &str {
        self.client.name()
    }

    async fn filter_entities_by_sp(
        &self,
        mut entities: EntityMap,
        sp_entity_id: &EntityId,
    ) -> Result<EntityMap> {
        let allowed = self.allowed_idps(sp_entity_id).await?;
        entities.retain(|e| !e.is_identity_provider() || allowed.contains(e.entity_id.as_str()));
        for entity in entities.iter_mut().filter(|e| e.is_identity_provider()) {
            entity.access = Some(true);
        }
        Ok(entities)
    }

    async fn mark_entities_by_sp(
        &self,
        mut entities: EntityMap,
        sp_entity_id: &EntityId,
    ) -> Result<EntityMap> {
        let allowed = self.allowed_idps(sp_entity_id).await?;
        for entity in entities.iter_mut().filter(|e| e.is_identity_provider()) {
            entity.access = Some(allowed.contains(entity.entity_id.as_str()));
        }
        Ok(entities)
    }

    async fn is_connection_allowed(
        &self,
        sp_entity_id: &EntityId,
        idp_entity_id: &EntityId,
    ) -> Result<bool> {
        Ok(self
            .client
            .is_connection_allowed(sp_entity_id, idp_entity_id)
            .await?)
    }

    async fn get_remote_metadata(&self) -> Result<EntityMap> {
        let sps = self.client.sp_list().await?;
        let idps = self.client.idp_list().await?;

        let mut entities = EntityMap::with_capacity(sps.len() + idps.len());
        self.map_listing(sps, EntityRole::ServiceProvider, &mut entities);
        self.map_listing(idps, EntityRole::IdentityProvider, &mut entities);
        info!("Fetched {} entities from remote registry", entities.len());
        Ok(entities)
    }

    async fn get_entity(&self, entity_id: &EntityId) -> Result<DomainEntity> {
        let payload = self.client.entity(entity_id).await?;
        Ok(self.mapper.map(entity_id.as_str(), None, &payload)?)
    }

    async fn get_arp(&self, sp_entity_id: &EntityId) -> Result<Option<AttributeReleasePolicy>> {
        let policy = self.client.arp(sp_entity_id).await?;
        Ok(policy.map(|policy| AttributeReleasePolicy::new(sp_entity_id.clone(), policy)))
    }

    async fn health_check(&self) -> bool {
        self.client.health_check().await
    }
}

/// Build the adapter selected by the configuration
///
/// Without a registry section the configured fallback decision applies.
pub fn build_policy_adapter(
    config: &Config,
    sink: Arc<dyn ErrorSink>,
) -> Result<Arc<dyn PolicyAdapter>> {
    match &config.registry {
        Some(registry) => {
            info!("Using remote registry at {}", registry.url);
            let client = RestRegistryClient::new(registry.clone())?;
            Ok(Arc::new(RegistryPolicyAdapter::new(client, sink)))
        }
        None => {
            info!(
                "No registry configured, using fixed {:?} policy",
                config.policy.fallback
            );
            Ok(Arc::new(FixedPolicyAdapter::new(config.policy.fallback)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use fedmeta_common::config::RegistryConfig;
    use fedmeta_common::{CollectingErrorSink, Endpoint, Error, RoleFlags};
    use serde_json::json;
    use std::collections::HashMap;

    /// In-memory registry
    #[derive(Default)]
    struct InMemoryRegistryClient {
        allowed: HashMap<String, Vec<String>>,
        entities: HashMap<String, serde_json::Value>,
        idps: RemoteListing,
        sps: RemoteListing,
        arps: HashMap<String, serde_json::Value>,
        unavailable: bool,
    }

    impl InMemoryRegistryClient {
        fn check(&self) -> RegistryResult<()> {
            if self.unavailable {
                return Err(RegistryError::Unavailable("connection refused".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RegistryClient for InMemoryRegistryClient {
        fn name(&self) -> &str {
            "memory"
        }

        async fn allowed_idps(&self, sp_entity_id: &EntityId) -> RegistryResult<Vec<String>> {
            self.check()?;
            Ok(self
                .allowed
                .get(sp_entity_id.as_str())
                .cloned()
                .unwrap_or_default())
        }

        async fn is_connection_allowed(
            &self,
            sp_entity_id: &EntityId,
            idp_entity_id: &EntityId,
        ) -> RegistryResult<bool> {
            let allowed = self.allowed_idps(sp_entity_id).await?;
            Ok(allowed.iter().any(|idp| idp == idp_entity_id.as_str()))
        }

        async fn entity(&self, entity_id: &EntityId) -> RegistryResult<serde_json::Value> {
            self.check()?;
            self.entities
                .get(entity_id.as_str())
                .cloned()
                .ok_or_else(|| RegistryError::NotFound(entity_id.to_string()))
        }

        async fn idp_list(&self) -> RegistryResult<RemoteListing> {
            self.check()?;
            Ok(self.idps.clone())
        }

        async fn sp_list(&self) -> RegistryResult<RemoteListing> {
            self.check()?;
            Ok(self.sps.clone())
        }

        async fn arp(&self, sp_entity_id: &EntityId) -> RegistryResult<Option<serde_json::Value>> {
            self.check()?;
            Ok(self.arps.get(sp_entity_id.as_str()).cloned())
        }
    }

    fn idp(id: &str) -> DomainEntity {
        DomainEntity::new(EntityId::new_unchecked(id), RoleFlags::IDP)
            .with_workflow_state("production")
            .with_single_sign_on_service(Endpoint::new("urn:redirect", format!("{id}/sso")))
    }

    fn sp(id: &str) -> DomainEntity {
        DomainEntity::new(EntityId::new_unchecked(id), RoleFlags::SP)
            .with_assertion_consumer_service(Endpoint::new("urn:post", format!("{id}/acs")))
    }

    fn abc() -> EntityMap {
        [idp("A"), idp("B"), sp("C")].into_iter().collect()
    }

    fn adapter(client: InMemoryRegistryClient) -> (RegistryPolicyAdapter<InMemoryRegistryClient>, Arc<CollectingErrorSink>) {
        let sink = Arc::new(CollectingErrorSink::new());
        (RegistryPolicyAdapter::new(client, sink.clone()), sink)
    }

    fn allowing_a() -> InMemoryRegistryClient {
        InMemoryRegistryClient {
            allowed: HashMap::from([("C".to_string(), vec!["A".to_string()])]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_filter_entities_by_sp() {
        let (adapter, _) = adapter(allowing_a());
        let sp_id = EntityId::new_unchecked("C");

        let result = adapter.filter_entities_by_sp(abc(), &sp_id).await.unwrap();
        let ids: Vec<&str> = result.ids().map(EntityId::as_str).collect();
        assert_eq!(ids, vec!["A", "C"]);
        assert_eq!(result.get("A").unwrap().access, Some(true));
        assert_eq!(result.get("C").unwrap(), &sp("C"));
    }

    #[tokio::test]
    async fn test_mark_entities_by_sp() {
        let (adapter, _) = adapter(allowing_a());
        let sp_id = EntityId::new_unchecked("C");

        let result = adapter.mark_entities_by_sp(abc(), &sp_id).await.unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result.get("A").unwrap().access, Some(true));
        assert_eq!(result.get("B").unwrap().access, Some(false));
        assert_eq!(result.get("C").unwrap(), &sp("C"));
    }

    #[tokio::test]
    async fn test_filter_entities_by_workflow_state() {
        let (adapter, _) = adapter(InMemoryRegistryClient::default());
        let mut entities = abc();
        entities.insert(idp("D").with_workflow_state("draft"));

        let result = adapter
            .filter_entities_by_workflow_state(entities, "production")
            .await
            .unwrap();
        let ids: Vec<&str> = result.ids().map(EntityId::as_str).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert_eq!(result.get("A").unwrap(), &idp("A"));
    }

    #[tokio::test]
    async fn test_remote_listing_isolates_bad_entries() {
        let client = InMemoryRegistryClient {
            idps: vec![
                (
                    "https://idp-good".to_string(),
                    json!({"SingleSignOnService:0:Location": "https://idp-good/sso"}),
                ),
                ("https://idp-bad".to_string(), json!({"SingleSignOnService:x:Location": "l"})),
                (
                    "https://both".to_string(),
                    json!({"SingleSignOnService:0:Location": "https://both/sso"}),
                ),
            ],
            sps: vec![(
                "https://both".to_string(),
                json!({"AssertionConsumerService:0:Location": "https://both/acs"}),
            )],
            ..Default::default()
        };
        let (adapter, sink) = adapter(client);

        let metadata = adapter.get_remote_metadata().await.unwrap();
        let ids: Vec<&str> = metadata.ids().map(EntityId::as_str).collect();
        assert_eq!(ids, vec!["https://both", "https://idp-good"]);
        assert!(metadata.get("https://both").unwrap().is_service_provider());

        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].component, "registry");
        assert_eq!(reports[0].kind, "remote_adapter");
        assert_eq!(
            reports[0].entity_id.as_ref().map(EntityId::as_str),
            Some("https://idp-bad")
        );
    }

    #[tokio::test]
    async fn test_listing_transport_failure_is_surfaced() {
        let (adapter, sink) = adapter(InMemoryRegistryClient {
            unavailable: true,
            ..Default::default()
        });
        let result = adapter.get_remote_metadata().await;
        assert!(matches!(result, Err(Error::RemoteAdapter(_))));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_get_entity_and_arp() {
        let client = InMemoryRegistryClient {
            entities: HashMap::from([(
                "https://sp".to_string(),
                json!({
                    "type": "saml20-sp",
                    "AssertionConsumerService:0:Location": "https://sp/acs"
                }),
            )]),
            arps: HashMap::from([(
                "https://sp".to_string(),
                json!({"attributes": ["urn:mace:dir:attribute-def:mail"]}),
            )]),
            ..Default::default()
        };
        let (adapter, _) = adapter(client);
        let sp_id = EntityId::new_unchecked("https://sp");

        let entity = adapter.get_entity(&sp_id).await.unwrap();
        assert!(entity.is_service_provider());

        let missing = adapter.get_entity(&EntityId::new_unchecked("https://none")).await;
        assert!(missing.unwrap_err().is_not_found());

        let arp = adapter.get_arp(&sp_id).await.unwrap().unwrap();
        assert_eq!(arp.sp_entity_id, sp_id);
        assert_eq!(arp.policy["attributes"][0], "urn:mace:dir:attribute-def:mail");
        assert!(adapter
            .get_arp(&EntityId::new_unchecked("https://none"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_is_connection_allowed() {
        let (adapter, _) = adapter(allowing_a());
        let sp_id = EntityId::new_unchecked("C");
        assert!(adapter.is_connection_allowed(&sp_id, &EntityId::new_unchecked("A")).await.unwrap());
        assert!(!adapter.is_connection_allowed(&sp_id, &EntityId::new_unchecked("B")).await.unwrap());
    }

    #[test]
    fn test_build_policy_adapter() {
        let sink: Arc<dyn ErrorSink> = Arc::new(CollectingErrorSink::new());

        let fixed = build_policy_adapter(&Config::default(), Arc::clone(&sink)).unwrap();
        assert_eq!(fixed.name(), "deny-all");

        let mut config = Config::default();
        config.registry = Some(RegistryConfig::new("http://127.0.0.1:1/api"));
        let remote = build_policy_adapter(&config, Arc::clone(&sink)).unwrap();
        assert_eq!(remote.name(), "rest");

        config.registry = Some(RegistryConfig::new("::nope::"));
        assert!(matches!(
            build_policy_adapter(&config, sink),
            Err(Error::Configuration(_))
        ));
    }
}
