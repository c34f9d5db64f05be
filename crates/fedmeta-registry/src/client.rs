//! Remote service registry client
//!
//! The REST client speaks a method-dispatch API: every call is a `GET` on
//! the configured endpoint with a `method` query parameter.
//!
//! | method | parameters | response |
//! |---|---|---|
//! | `getAllowedIdps` | `spentityid` | `["<idp>", ...]` |
//! | `isConnectionAllowed` | `spentityid`, `idpentityid` | `{"allowed": bool}` |
//! | `getEntity` | `entityid` | key-value object, 404 when unknown |
//! | `getIdpList` / `getSpList` | | `{"<id>": {key-value}, ...}` |
//! | `getArp` | `entityid` | JSON object or `null` |

use crate::error::{RegistryError, RegistryResult};
use async_trait::async_trait;
use fedmeta_common::EntityId;
use fedmeta_common::config::RegistryConfig;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Raw listing entries: identifier plus the entry's key-value payload
///
/// Payloads are left unparsed so one bad entry can be isolated.
pub type RemoteListing = Vec<(String, serde_json::Value)>;

/// Transport to a remote service registry
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Client name for logging
    fn name(&self) -> &str;

    /// Identity providers the service provider may connect to
    async fn allowed_idps(&self, sp_entity_id: &EntityId) -> RegistryResult<Vec<String>>;

    async fn is_connection_allowed(
        &self,
        sp_entity_id: &EntityId,
        idp_entity_id: &EntityId,
    ) -> RegistryResult<bool>;

    /// Key-value payload of one entity
    async fn entity(&self, entity_id: &EntityId) -> RegistryResult<serde_json::Value>;

    async fn idp_list(&self) -> RegistryResult<RemoteListing>;

    async fn sp_list(&self) -> RegistryResult<RemoteListing>;

    /// Attribute release policy payload of a service provider, if any
    async fn arp(&self, sp_entity_id: &EntityId) -> RegistryResult<Option<serde_json::Value>>;

    /// Health check for the registry
    async fn health_check(&self) -> bool {
        true // Default: always healthy
    }
}

#[derive(Debug, Deserialize)]
struct ConnectionAllowedResponse {
    allowed: bool,
}

/// REST registry client over `reqwest`
#[derive(Debug)]
pub struct RestRegistryClient {
    config: RegistryConfig,
    http_client: reqwest::Client,
}

impl RestRegistryClient {
    /// Create a new REST registry client
    pub fn new(config: RegistryConfig) -> RegistryResult<Self> {
        reqwest::Url::parse(&config.url)
            .map_err(|e| RegistryError::Configuration(format!("invalid registry url: {e}")))?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| RegistryError::Configuration(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Registry endpoint
    #[must_use]
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Issue one method call; `Ok(None)` on 404
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> RegistryResult<Option<T>> {
        debug!("Registry call {} {:?}", method, params);

        let response = self
            .http_client
            .get(&self.config.url)
            .query(&[("method", method)])
            .query(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RegistryError::Timeout
                } else {
                    RegistryError::Unavailable(e.to_string())
                }
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::Unavailable(format!(
                "registry returned status {status} for {method}: {body}"
            )));
        }

        let body = response.json().await.map_err(|e| {
            if e.is_timeout() {
                RegistryError::Timeout
            } else {
                RegistryError::InvalidResponse(format!("{method}: {e}"))
            }
        })?;
        Ok(Some(body))
    }

    async fn call_required<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> RegistryResult<T> {
        self.call(method, params).await?.ok_or_else(|| {
            RegistryError::InvalidResponse(format!("{method}: registry returned 404"))
        })
    }

    async fn listing(&self, method: &str) -> RegistryResult<RemoteListing> {
        let entries: serde_json::Map<String, serde_json::Value> =
            self.call_required(method, &[]).await?;
        Ok(entries.into_iter().collect())
    }
}

#[async_trait]
impl RegistryClient for RestRegistryClient {
    fn name(&self) -> &str {
        "rest"
    }

    async fn allowed_idps(&self, sp_entity_id: &EntityId) -> RegistryResult<Vec<String>> {
        self.call_required("getAllowedIdps", &[("spentityid", sp_entity_id.as_str())])
            .await
    }

    async fn is_connection_allowed(
        &self,
        sp_entity_id: &EntityId,
        idp_entity_id: &EntityId,
    ) -> RegistryResult<bool> {
        let response: ConnectionAllowedResponse = self
            .call_required(
                "isConnectionAllowed",
                &[
                    ("spentityid", sp_entity_id.as_str()),
                    ("idpentityid", idp_entity_id.as_str()),
                ],
            )
            .await?;
        Ok(response.allowed)
    }

    async fn entity(&self, entity_id: &EntityId) -> RegistryResult<serde_json::Value> {
        self.call("getEntity", &[("entityid", entity_id.as_str())])
            .await?
            .ok_or_else(|| RegistryError::NotFound(entity_id.to_string()))
    }

    async fn idp_list(&self) -> RegistryResult<RemoteListing> {
        self.listing("getIdpList").await
    }

    async fn sp_list(&self) -> RegistryResult<RemoteListing> {
        self.listing("getSpList").await
    }

    async fn arp(&self, sp_entity_id: &EntityId) -> RegistryResult<Option<serde_json::Value>> {
        let payload: Option<serde_json::Value> = self
            .call("getArp", &[("entityid", sp_entity_id.as_str())])
            .await?;
        Ok(payload.filter(|value| !value.is_null()))
    }
}
