//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod server;

pub use server::{BroadcastConfig, ServerConfig};

use serde::Deserialize;
use tracing::info;

use crate::bus::MessagingConfig;
use crate::storage::{StorageConfig, StorageType};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "MONITORING_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "MONITORING";

/// Legacy: broker host, credentials fixed by the deployment.
pub const RABBITMQ_HOST_ENV_VAR: &str = "RABBITMQ_HOST";
/// Legacy: PostgreSQL host. Setting it selects the postgres backend.
pub const DB_HOST_ENV_VAR: &str = "DB_HOST";
/// Legacy: PostgreSQL database name.
pub const DB_NAME_ENV_VAR: &str = "DB_NAME";
/// Legacy: PostgreSQL user.
pub const DB_USER_ENV_VAR: &str = "DB_USER";
/// Legacy: PostgreSQL password.
pub const DB_PASS_ENV_VAR: &str = "DB_PASS";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Queue consumer configuration.
    pub messaging: MessagingConfig,
    /// Live subscriber configuration.
    pub broadcast: BroadcastConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    /// 5. Legacy deployment variables (`RABBITMQ_HOST`, `DB_*`)
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let vars = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self::load_with_env(path, vars)
    }

    /// Load configuration using `vars` in place of the process environment.
    pub fn load_with_env(
        path: Option<&str>,
        vars: ::config::Map<String, String>,
    ) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Some(config_path) = vars.get(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(vars.clone())),
            )
            .build()?;

        let mut config: Config = config.try_deserialize()?;
        config.apply_legacy_env(|key| vars.get(key).cloned());
        Ok(config)
    }

    /// Apply the variables of the legacy container deployment.
    pub fn apply_legacy_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(RABBITMQ_HOST_ENV_VAR) {
            self.messaging.url = format!("amqp://kalo:kalo@{}:5672/%2f", host);
            info!(host = %host, "Using legacy broker host");
        }

        if let Some(host) = lookup(DB_HOST_ENV_VAR) {
            let name = lookup(DB_NAME_ENV_VAR).unwrap_or_else(|| "example-db".to_string());
            let user = lookup(DB_USER_ENV_VAR).unwrap_or_else(|| "postgres".to_string());
            let pass = lookup(DB_PASS_ENV_VAR).unwrap_or_else(|| "postgres".to_string());

            self.storage.storage_type = StorageType::Postgres;
            self.storage.path = format!("postgres://{}:{}@{}:5432/{}", user, pass, host, name);
            info!(host = %host, database = %name, "Using legacy database settings");
        }
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        let mut config = Self::default();
        config.storage.storage_type = StorageType::Sqlite;
        config.storage.path = ":memory:".to_string();
        config
    }
}
