//! Configuration types for fedmeta
//!
//! This module defines configuration structures used across components.
//! Every section has defaults so a partial TOML file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for fedmeta
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local metadata repository configuration
    pub repository: RepositoryConfig,
    /// Remote service registry (policy adapter backend)
    pub registry: Option<RegistryConfig>,
    /// Policy used when no registry is configured
    pub policy: PolicyConfig,
}

/// Local metadata repository configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Directory holding `metadata.index.json` and the entity records
    pub metadata_dir: PathBuf,
    /// Store the repository reads from
    pub backend: StoreBackend,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            metadata_dir: PathBuf::from("/var/lib/fedmeta/metadata"),
            backend: StoreBackend::default(),
        }
    }
}

/// Backing store of the repository
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreBackend {
    /// JSON index + one JSON document per entity in `metadata_dir`
    #[default]
    Files,
    /// redb database with criteria pushdown
    Redb { path: PathBuf },
}

/// Remote service registry configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry REST endpoint (e.g., "https://registry.example.org/api/rest")
    pub url: String,
    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

const fn default_timeout_ms() -> u64 {
    5_000
}

impl RegistryConfig {
    /// Create a new registry config
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_ms: default_timeout_ms(),
        }
    }

    /// Set the request timeout
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Fixed decision applied when no registry is configured
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackDecision {
    Allow,
    /// Fail closed
    #[default]
    Deny,
}

/// Policy configuration
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub fallback: FallbackDecision,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.repository.backend, StoreBackend::Files);
        assert!(config.registry.is_none());
        assert_eq!(config.policy.fallback, FallbackDecision::Deny);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [repository]
            metadata_dir = "/srv/metadata"
            backend = { kind = "redb", path = "/srv/metadata.redb" }

            [registry]
            url = "https://registry.example.org/api/rest"
            "#,
        )
        .unwrap();

        assert_eq!(config.repository.metadata_dir, PathBuf::from("/srv/metadata"));
        assert_eq!(
            config.repository.backend,
            StoreBackend::Redb {
                path: PathBuf::from("/srv/metadata.redb")
            }
        );
        let registry = config.registry.unwrap();
        assert_eq!(registry.timeout_ms, 5_000);
        assert_eq!(config.policy.fallback, FallbackDecision::Deny);
    }

    #[test]
    fn test_registry_config_builder() {
        let config = RegistryConfig::new("http://localhost:8080").with_timeout_ms(250);
        assert_eq!(config.url, "http://localhost:8080");
        assert_eq!(config.timeout_ms, 250);
    }
}
