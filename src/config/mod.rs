//! Configuration management module.
//!
//! Supports loading configuration from:
//! - TOML files (config/default.toml, config/{profile}.toml)
//! - Environment variables with `SITEBOOK__<SECTION>__<KEY>` pattern
//! - A `.env` file in the working directory

mod server;
mod storage;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::domain::counter::{DEFAULT_SEQUENCE_LENGTH, MAX_SEQUENCE_LENGTH, validate_counter_name};
use crate::domain::schema::{CollectionRegistry, CollectionSchema, default_collections};

pub use server::ServerConfig;
pub use storage::{FileStorageConfig, PostgresStorageConfig, StorageBackend, StorageConfig};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// List query limits.
    #[serde(default)]
    pub query: QueryConfig,

    /// Sequential ID defaults.
    #[serde(default)]
    pub sequence: SequenceConfig,

    /// Collection schemas.
    #[serde(default = "default_collections")]
    pub collections: Vec<CollectionSchema>,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            query: QueryConfig::default(),
            sequence: SequenceConfig::default(),
            collections: default_collections(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. `config/default.toml`
    /// 2. `config/{SITEBOOK_PROFILE}.toml` (if `SITEBOOK_PROFILE` is set)
    /// 3. Environment variables with `SITEBOOK__` prefix
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();

        let profile =
            std::env::var("SITEBOOK_PROFILE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{profile}")).required(false))
            // SITEBOOK__SERVER__PORT=8080 -> server.port = 8080
            .add_source(
                Environment::with_prefix("SITEBOOK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: Self = config.try_deserialize()?;
        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("server.port cannot be 0".to_string()));
        }

        self.storage.validate()?;
        self.query.validate()?;

        if !(1..=MAX_SEQUENCE_LENGTH).contains(&self.sequence.default_length) {
            return Err(ConfigError::Message(format!(
                "sequence.default_length must be between 1 and {MAX_SEQUENCE_LENGTH}"
            )));
        }

        let registry = self.registry()?;
        for name in registry.names() {
            let Some(sequence) = registry.get(name).and_then(|schema| schema.sequence.as_ref())
            else {
                continue;
            };
            validate_counter_name(&sequence.counter)
                .and_then(|()| {
                    sequence
                        .options()
                        .resolve(self.sequence.default_length)
                        .map(|_| ())
                })
                .map_err(|e| ConfigError::Message(format!("collections.{name}: {e}")))?;
        }

        Ok(())
    }

    /// Build the collection registry from the configured schemas.
    ///
    /// # Errors
    ///
    /// Returns an error if the schemas are inconsistent.
    pub fn registry(&self) -> Result<CollectionRegistry, ConfigError> {
        CollectionRegistry::new(self.collections.clone()).map_err(ConfigError::Message)
    }
}

/// List query limits.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QueryConfig {
    /// Page size when `limit` is absent.
    #[serde(default = "default_limit")]
    pub default_limit: u64,

    /// Largest accepted `limit`.
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,
}

const fn default_limit() -> u64 {
    20
}

const fn default_max_limit() -> u64 {
    100
}

impl QueryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_limit == 0 || self.max_limit == 0 {
            return Err(ConfigError::Message(
                "query.default_limit and query.max_limit must be positive".to_string(),
            ));
        }
        if self.default_limit > self.max_limit {
            return Err(ConfigError::Message(
                "query.default_limit cannot exceed query.max_limit".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

/// Sequential ID defaults.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SequenceConfig {
    /// Padding width used when a request gives none.
    #[serde(default = "default_sequence_length")]
    pub default_length: usize,
}

const fn default_sequence_length() -> usize {
    DEFAULT_SEQUENCE_LENGTH
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            default_length: default_sequence_length(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: "text" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Enable Prometheus metrics endpoint.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

const fn default_metrics_enabled() -> bool {
    true
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}
