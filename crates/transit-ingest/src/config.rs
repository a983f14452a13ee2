//! Configuration for the ingestion pipelines
//!
//! Values come from environment variables (a `.env` file is honoured) with the
//! defaults below.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{IngestError, Result};
use crate::storage::config::StorageConfig;

// ============================================================================
// Defaults
// ============================================================================

/// Dataset (Postgres schema) that receives every table.
pub const DEFAULT_DATASET: &str = "transporte_publico";

/// Rows per insert request.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Timeout for upstream HTTP calls in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Base URL of the transit authority REST API.
pub const DEFAULT_TRANSIT_API_BASE_URL: &str = "https://www.red.cl/restservice_v2/rest";

/// GTFS static feed published by the transit authority.
pub const DEFAULT_GTFS_FEED_URL: &str = "https://www.dtpm.cl/descargas/gtfs/GTFS-V124-PO20240601.zip";

pub const DEFAULT_PUBSUB_ENDPOINT: &str = "https://pubsub.googleapis.com";
pub const DEFAULT_PUBSUB_TOPIC: &str = "get_daily_data";

pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/transit";
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Read an environment variable and parse it, falling back to `default`
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Table store connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
        }
    }
}

/// Message queue settings for the realtime variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubSubConfig {
    pub endpoint: String,
    pub project_id: String,
    pub topic: String,
    /// Bearer token passed through as-is
    pub access_token: Option<String>,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_PUBSUB_ENDPOINT.to_string(),
            project_id: String::new(),
            topic: DEFAULT_PUBSUB_TOPIC.to_string(),
            access_token: None,
        }
    }
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub dataset: String,
    pub batch_size: usize,
    pub http_timeout_secs: u64,
    pub transit_api_base_url: String,
    pub gtfs_feed_url: String,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub pubsub: PubSubConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            dataset: DEFAULT_DATASET.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            transit_api_base_url: DEFAULT_TRANSIT_API_BASE_URL.to_string(),
            gtfs_feed_url: DEFAULT_GTFS_FEED_URL.to_string(),
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            pubsub: PubSubConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Load configuration from `.env` and the environment, then validate it
    ///
    /// Environment variables:
    /// - `INGEST_DATASET`, `INGEST_BATCH_SIZE`, `INGEST_HTTP_TIMEOUT_SECS`
    /// - `TRANSIT_API_BASE_URL`, `GTFS_FEED_URL`
    /// - `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS`, `DATABASE_CONNECT_TIMEOUT`
    /// - `PUBSUB_ENDPOINT`, `PUBSUB_PROJECT_ID`, `PUBSUB_TOPIC`, `PUBSUB_ACCESS_TOKEN`
    /// - `S3_*` (see [`StorageConfig::from_env`])
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_env();
        config.validate()?;

        Ok(config)
    }

    pub fn from_env() -> Self {
        Self {
            dataset: env_string("INGEST_DATASET", DEFAULT_DATASET),
            batch_size: env_or("INGEST_BATCH_SIZE", DEFAULT_BATCH_SIZE),
            http_timeout_secs: env_or("INGEST_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
            transit_api_base_url: env_string("TRANSIT_API_BASE_URL", DEFAULT_TRANSIT_API_BASE_URL),
            gtfs_feed_url: env_string("GTFS_FEED_URL", DEFAULT_GTFS_FEED_URL),
            database: DatabaseConfig {
                url: env_string("DATABASE_URL", DEFAULT_DATABASE_URL),
                max_connections: env_or(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                ),
                connect_timeout_secs: env_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
            },
            storage: StorageConfig::from_env(),
            pubsub: PubSubConfig {
                endpoint: env_string("PUBSUB_ENDPOINT", DEFAULT_PUBSUB_ENDPOINT),
                project_id: env_string("PUBSUB_PROJECT_ID", ""),
                topic: env_string("PUBSUB_TOPIC", DEFAULT_PUBSUB_TOPIC),
                access_token: std::env::var("PUBSUB_ACCESS_TOKEN").ok(),
            },
        }
    }

    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.dataset.trim().is_empty() {
            return Err(IngestError::Config("Dataset cannot be empty".to_string()));
        }

        // Dataset names are interpolated as SQL identifiers
        if !is_identifier(&self.dataset) {
            return Err(IngestError::Config(format!(
                "Dataset '{}' must contain only letters, digits and underscores",
                self.dataset
            )));
        }

        if self.batch_size == 0 {
            return Err(IngestError::Config(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        if self.http_timeout_secs == 0 {
            return Err(IngestError::Config(
                "HTTP timeout must be greater than 0".to_string(),
            ));
        }

        if self.transit_api_base_url.is_empty() {
            return Err(IngestError::Config(
                "Transit API base URL cannot be empty".to_string(),
            ));
        }

        if self.gtfs_feed_url.is_empty() {
            return Err(IngestError::Config("GTFS feed URL cannot be empty".to_string()));
        }

        if self.database.max_connections == 0 {
            return Err(IngestError::Config(
                "Database max_connections must be greater than 0".to_string(),
            ));
        }

        self.storage.validate()?;

        Ok(())
    }
}

/// True for non-empty `[A-Za-z0-9_]` names not starting with a digit
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {},
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Builder for IngestConfig
#[derive(Debug, Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn dataset(mut self, dataset: impl Into<String>) -> Self {
        self.config.dataset = dataset.into();
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn http_timeout_secs(mut self, secs: u64) -> Self {
        self.config.http_timeout_secs = secs;
        self
    }

    pub fn transit_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.transit_api_base_url = url.into();
        self
    }

    pub fn gtfs_feed_url(mut self, url: impl Into<String>) -> Self {
        self.config.gtfs_feed_url = url.into();
        self
    }

    pub fn pubsub(mut self, pubsub: PubSubConfig) -> Self {
        self.config.pubsub = pubsub;
        self
    }

    pub fn build(self) -> IngestConfig {
        self.config
    }
}

// ============================================================================
// Tests
// ============================================================================
