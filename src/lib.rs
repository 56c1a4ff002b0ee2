//! Performance Store
//!
//! Storage and query layer for CI performance telemetry:
//! - Content-addressed performance results with typed metric rollups
//! - Parent/child lineage with bounded breadth-first traversal
//! - Filtered, ordered and paginated result queries
//! - Neo4j backend and an in-memory backend behind one `Connector` trait
//! - Idempotent scheduling of signal-processing recalculation jobs

pub mod connector;
pub mod context;
pub mod error;
pub mod lineage;
pub mod model;
pub mod neo4j;
pub mod query;
pub mod queue;
pub mod signal_processing;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use connector::{Connector, DbConnector, MockConnector};
pub use error::{PerfError, Result};

use queue::{JobQueue, LocalQueue};
use serde::Deserialize;
use signal_processing::{LoggingSignalProcessor, RecalculationScheduler, SignalProcessor};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use store::{MemoryStore, ResultStore};

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub neo4j: Neo4jYamlConfig,
    pub queue: QueueYamlConfig,
    pub query: QueryYamlConfig,
}

/// Neo4j configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Neo4jYamlConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

impl Default for Neo4jYamlConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".into(),
            user: "neo4j".into(),
            password: "perfstore".into(),
        }
    }
}

/// Local job queue section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueYamlConfig {
    pub workers: usize,
    pub capacity: usize,
}

impl Default for QueueYamlConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            capacity: 1024,
        }
    }
}

/// Query section. No timeout by default.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct QueryYamlConfig {
    pub timeout_secs: Option<u64>,
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub queue_workers: usize,
    pub queue_capacity: usize,
    pub query_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_yaml(YamlConfig::default())
    }
}

impl Config {
    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. A missing file means
    /// env vars and defaults only.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> anyhow::Result<Self> {
        let yaml = Self::load_yaml(yaml_path);
        let defaults = Self::from_yaml(yaml);

        Ok(Self {
            neo4j_uri: std::env::var("NEO4J_URI").unwrap_or(defaults.neo4j_uri),
            neo4j_user: std::env::var("NEO4J_USER").unwrap_or(defaults.neo4j_user),
            neo4j_password: std::env::var("NEO4J_PASSWORD").unwrap_or(defaults.neo4j_password),
            queue_workers: env_parse("QUEUE_WORKERS")?.unwrap_or(defaults.queue_workers),
            queue_capacity: env_parse("QUEUE_CAPACITY")?.unwrap_or(defaults.queue_capacity),
            query_timeout: env_parse::<u64>("QUERY_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .or(defaults.query_timeout),
        })
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        Self {
            neo4j_uri: yaml.neo4j.uri,
            neo4j_user: yaml.neo4j.user,
            neo4j_password: yaml.neo4j.password,
            queue_workers: yaml.queue.workers,
            queue_capacity: yaml.queue.capacity,
            query_timeout: yaml.query.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

/// Unset is `None`; a set but unparsable value is an error.
fn env_parse<T: std::str::FromStr>(var: &str) -> anyhow::Result<Option<T>> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("Invalid value for {}: {:?}", var, raw)),
        Err(_) => Ok(None),
    }
}

/// Wired services
#[derive(Clone)]
pub struct AppState {
    pub connector: Arc<dyn Connector>,
    pub queue: Arc<LocalQueue>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Connect to Neo4j and build the persistent connector
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::with_processor(config, Arc::new(LoggingSignalProcessor)).await
    }

    pub async fn with_processor(
        config: Config,
        processor: Arc<dyn SignalProcessor>,
    ) -> anyhow::Result<Self> {
        let client = Arc::new(
            neo4j::Neo4jClient::new(
                &config.neo4j_uri,
                &config.neo4j_user,
                &config.neo4j_password,
            )
            .await?
            .with_query_timeout(config.query_timeout),
        );
        let queue = Arc::new(LocalQueue::new(config.queue_workers, config.queue_capacity));
        let store: Arc<dyn ResultStore> = client.clone();
        let scheduler = RecalculationScheduler::new(store, queue.clone(), processor);

        Ok(Self {
            connector: Arc::new(DbConnector::new(client, scheduler)),
            queue,
            config: Arc::new(config),
        })
    }

    /// Build the in-memory connector over an empty store.
    pub fn in_memory(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(LocalQueue::new(config.queue_workers, config.queue_capacity));
        let scheduler = RecalculationScheduler::new(
            store.clone(),
            queue.clone(),
            Arc::new(LoggingSignalProcessor),
        );
        Self {
            connector: Arc::new(MockConnector::new(store, scheduler)),
            queue,
            config: Arc::new(config),
        }
    }

    /// Start the job queue workers
    pub async fn start_queue(&self) -> anyhow::Result<()> {
        self.queue.start().await?;
        Ok(())
    }

    pub fn store(&self) -> &dyn ResultStore {
        self.connector.store()
    }
}

// ============================================================================
// Tests
// ============================================================================
