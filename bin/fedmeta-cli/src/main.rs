//! fedmeta CLI
//!
//! Inspects the local metadata repository and the remote policy registry.
//! Every command prints pretty JSON on stdout; logs go to stderr.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use fedmeta_common::config::{FallbackDecision, RegistryConfig, StoreBackend};
use fedmeta_common::{Config, EntityId, EntityRole, ErrorSink, TracingErrorSink};
use fedmeta_core::{FetchOutcome, Filter, FilterSet, MetadataRepository, open_repository};
use fedmeta_registry::{PolicyAdapter, build_policy_adapter};
use fedmeta_store::{DirectoryEntitySource, MetadataIndex, RedbMetadataStore};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "fedmeta")]
#[command(about = "Federation metadata filtering and aggregation")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "FEDMETA_CONFIG", default_value = "/etc/fedmeta/fedmeta.toml")]
    config: PathBuf,

    /// Metadata directory (overrides config)
    #[arg(long, env = "FEDMETA_METADATA_DIR")]
    metadata_dir: Option<PathBuf>,

    /// Read from a redb database instead of the metadata directory
    #[arg(long, env = "FEDMETA_DATABASE")]
    database: Option<PathBuf>,

    /// Remote registry endpoint (overrides config)
    #[arg(long, env = "FEDMETA_REGISTRY_URL")]
    registry_url: Option<String>,

    /// Decision applied when no registry is configured
    #[arg(long, value_enum)]
    fallback: Option<FallbackArg>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List local entities, optionally filtered
    Entities {
        /// Keep only entities in this workflow state
        #[arg(long)]
        workflow_state: Option<String>,
        /// Exclude an entity (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
        /// Keep only entities with this role
        #[arg(long, value_enum)]
        role: Option<RoleArg>,
    },
    /// Show one local entity
    Entity { entity_id: String },
    /// Copy the metadata directory into a redb database
    Import { db_path: PathBuf },
    /// List the entities known to the remote registry
    RemoteMetadata,
    /// Check whether a service provider may use an identity provider
    ConnectionAllowed { sp: String, idp: String },
    /// List local entities with identity providers narrowed for a service provider
    FilterBySp { sp: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    Idp,
    Sp,
}

impl From<RoleArg> for EntityRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Idp => Self::IdentityProvider,
            RoleArg::Sp => Self::ServiceProvider,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FallbackArg {
    Allow,
    Deny,
}

impl From<FallbackArg> for FallbackDecision {
    fn from(decision: FallbackArg) -> Self {
        match decision {
            FallbackArg::Allow => Self::Allow,
            FallbackArg::Deny => Self::Deny,
        }
    }
}

/// Read the TOML config; a missing file yields defaults
fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        info!("No config file at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

/// Merge CLI args with the config file (CLI takes precedence)
fn apply_overrides(mut config: Config, args: &Args) -> Config {
    if let Some(dir) = &args.metadata_dir {
        config.repository.metadata_dir.clone_from(dir);
    }
    if let Some(path) = &args.database {
        config.repository.backend = StoreBackend::Redb { path: path.clone() };
    }
    if let Some(url) = &args.registry_url {
        config.registry = Some(match config.registry.take() {
            Some(mut registry) => {
                registry.url.clone_from(url);
                registry
            }
            None => RegistryConfig::new(url.clone()),
        });
    }
    if let Some(fallback) = args.fallback {
        config.policy.fallback = fallback.into();
    }
    config
}

fn filter_set(
    workflow_state: Option<String>,
    exclude: Vec<String>,
    role: Option<RoleArg>,
) -> FilterSet {
    let mut filters: FilterSet = exclude.into_iter().map(Filter::remove_entity).collect();
    if let Some(state) = workflow_state {
        filters.push(Filter::workflow_state(state));
    }
    if let Some(role) = role {
        filters.push(Filter::role(role.into()));
    }
    filters
}

fn log_skipped(outcome: &FetchOutcome) {
    for skipped in &outcome.skipped {
        warn!("Skipped entity {}: {}", skipped.entity_id, skipped.error);
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn import(config: &Config, db_path: &Path) -> Result<()> {
    if config.repository.backend != StoreBackend::Files {
        bail!("import reads the metadata directory; drop --database");
    }
    let dir = &config.repository.metadata_dir;
    let index = MetadataIndex::load(dir)?;
    let source = DirectoryEntitySource::new(dir);
    let store = RedbMetadataStore::open(db_path)?;
    let report = store.import_directory(&index, &source)?;

    let failures: Vec<_> = report
        .failures
        .iter()
        .map(|(id, reason)| json!({ "entity_id": id, "error": reason }))
        .collect();
    print_json(&json!({
        "imported": report.imported,
        "failures": failures,
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = apply_overrides(load_config(&args.config)?, &args);
    let sink: Arc<dyn ErrorSink> = Arc::new(TracingErrorSink);

    match args.command {
        Commands::Entities {
            workflow_state,
            exclude,
            role,
        } => {
            let repository = open_repository(&config.repository, sink)?;
            let filters = filter_set(workflow_state, exclude, role);
            info!("Listing entities with {}", filters);
            let outcome = repository.find_entities(&filters)?;
            log_skipped(&outcome);
            print_json(&outcome.entities)?;
        }
        Commands::Entity { entity_id } => {
            let repository = open_repository(&config.repository, sink)?;
            let entity = repository.fetch_entity_by_entity_id(&EntityId::new(entity_id)?)?;
            print_json(&entity)?;
        }
        Commands::Import { db_path } => import(&config, &db_path)?,
        Commands::RemoteMetadata => {
            let adapter = build_policy_adapter(&config, sink)?;
            print_json(&adapter.get_remote_metadata().await?)?;
        }
        Commands::ConnectionAllowed { sp, idp } => {
            let adapter = build_policy_adapter(&config, sink)?;
            let allowed = adapter
                .is_connection_allowed(&EntityId::new(sp)?, &EntityId::new(idp)?)
                .await?;
            print_json(&json!({ "allowed": allowed }))?;
        }
        Commands::FilterBySp { sp } => {
            let sp = EntityId::new(sp)?;
            let repository = open_repository(&config.repository, Arc::clone(&sink))?;
            let adapter = build_policy_adapter(&config, sink)?;
            let outcome = repository.fetch_all_entities();
            log_skipped(&outcome);
            let entities = adapter.filter_entities_by_sp(outcome.entities, &sp).await?;
            print_json(&entities)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedmeta_common::{IndexedEntity, RoleFlags};
    use tempfile::tempdir;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["fedmeta"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_missing_config_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert!(config.registry.is_none());
    }

    #[test]
    fn test_malformed_config_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fedmeta.toml");
        std::fs::write(&path, "[repository\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let mut config = Config::default();
        config.registry = Some(RegistryConfig::new("http://old").with_timeout_ms(42));

        let args = args(&[
            "--metadata-dir",
            "/srv/md",
            "--database",
            "/srv/md.redb",
            "--registry-url",
            "http://new",
            "--fallback",
            "allow",
            "remote-metadata",
        ]);
        let config = apply_overrides(config, &args);

        assert_eq!(config.repository.metadata_dir, PathBuf::from("/srv/md"));
        assert_eq!(
            config.repository.backend,
            StoreBackend::Redb {
                path: PathBuf::from("/srv/md.redb")
            }
        );
        let registry = config.registry.unwrap();
        assert_eq!(registry.url, "http://new");
        assert_eq!(registry.timeout_ms, 42);
        assert_eq!(config.policy.fallback, FallbackDecision::Allow);
    }

    #[test]
    fn test_filter_set_from_flags() {
        let filters = filter_set(
            Some("production".into()),
            vec!["https://a".into()],
            Some(RoleArg::Idp),
        );
        assert_eq!(
            filters.to_string(),
            "FilterSet -> [RemoveEntityByEntityId -> https://a, WorkflowState -> production, Role -> idp]"
        );

        let idp = IndexedEntity::new(EntityId::new_unchecked("https://b"), RoleFlags::IDP)
            .with_workflow_state("production");
        assert!(filters.first_rejection(&idp).is_none());
    }

    #[test]
    fn test_entities_command_parses() {
        let args = args(&["entities", "--exclude", "x", "--exclude", "y", "--role", "sp"]);
        let Commands::Entities { exclude, role, .. } = args.command else {
            panic!("expected entities command");
        };
        assert_eq!(exclude, vec!["x".to_string(), "y".to_string()]);
        assert!(matches!(role, Some(RoleArg::Sp)));
    }
}
