//! Reading storage.
//!
//! This module contains:
//! - `ReadingStore` trait: durable raw readings plus the hourly rollup
//! - Storage configuration and `init_storage`
//! - Implementations: SQLite, PostgreSQL (shared SQL code), Mock

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::aggregator::HourlyBucket;
use crate::reading::Reading;
use crate::utils::retry::retry_forever;

pub mod mock;
pub mod schema;
pub mod sql;

pub use mock::MockReadingStore;
#[cfg(feature = "postgres")]
pub use sql::postgres::PostgresReadingStore;
#[cfg(feature = "sqlite")]
pub use sql::sqlite::SqliteReadingStore;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend '{0}' is not compiled in")]
    Unsupported(String),

    #[error("Injected failure: {0}")]
    Injected(String),
}

/// Durable store for readings and their hourly buckets.
///
/// Implementations:
/// - `SqliteReadingStore`: SQLite storage
/// - `PostgresReadingStore`: PostgreSQL storage
/// - `MockReadingStore`: In-memory mock for testing
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Create tables if they do not exist.
    async fn init(&self) -> Result<()>;

    /// Append the reading and add its value to its hourly bucket, atomically.
    async fn record(&self, reading: &Reading) -> Result<()>;

    /// Buckets of one device for a `YYYY-MM-DD` day, ascending by hour.
    ///
    /// A malformed date yields an empty vector, not an error.
    async fn hourly_consumption(&self, device_id: &str, date: &str) -> Result<Vec<HourlyBucket>>;
}

// ============================================================================
// Configuration
// ============================================================================

/// Storage type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// SQLite file (or `:memory:`).
    Sqlite,
    /// PostgreSQL server.
    Postgres,
}

impl Default for StorageType {
    fn default() -> Self {
        if cfg!(feature = "sqlite") {
            StorageType::Sqlite
        } else {
            StorageType::Postgres
        }
    }
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageType::Sqlite => write!(f, "sqlite"),
            StorageType::Postgres => write!(f, "postgres"),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type discriminator.
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// SQLite file path, or PostgreSQL connection URL.
    pub path: String,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// Fixed delay between connection attempts while the database is unreachable.
    pub retry_delay_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::default(),
            path: "data/monitoring.db".to_string(),
            max_connections: 5,
            retry_delay_secs: 2,
        }
    }
}

impl StorageConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

// ============================================================================
// Factory
// ============================================================================

#[cfg(feature = "sqlite")]
const SQLITE_IN_MEMORY: &str = ":memory:";

/// Initialize storage based on configuration.
///
/// Connection attempts are retried indefinitely with a fixed delay: the store
/// is a required dependency and there is no degraded mode. Tables are created
/// once connected.
pub async fn init_storage(config: &StorageConfig) -> Result<Arc<dyn ReadingStore>> {
    info!(storage_type = %config.storage_type, "Initializing storage");

    let store: Arc<dyn ReadingStore> = match config.storage_type {
        StorageType::Sqlite => {
            #[cfg(feature = "sqlite")]
            {
                prepare_sqlite_path(config)?;
                let pool = retry_forever("sqlite", config.retry_delay(), || {
                    connect_sqlite(config)
                })
                .await?;
                Arc::new(SqliteReadingStore::new(pool))
            }

            #[cfg(not(feature = "sqlite"))]
            {
                return Err(StorageError::Unsupported("sqlite".to_string()));
            }
        }
        StorageType::Postgres => {
            #[cfg(feature = "postgres")]
            {
                let pool = retry_forever("postgres", config.retry_delay(), || {
                    sqlx::postgres::PgPoolOptions::new()
                        .max_connections(config.max_connections)
                        .connect(&config.path)
                })
                .await?;
                Arc::new(PostgresReadingStore::new(pool))
            }

            #[cfg(not(feature = "postgres"))]
            {
                return Err(StorageError::Unsupported("postgres".to_string()));
            }
        }
    };

    store.init().await?;
    info!(storage_type = %config.storage_type, "Storage ready");

    Ok(store)
}

/// Create the database file's parent directory. Not retried: a bad path or
/// missing permission will not fix itself.
#[cfg(feature = "sqlite")]
fn prepare_sqlite_path(config: &StorageConfig) -> Result<()> {
    if config.path == SQLITE_IN_MEMORY {
        return Ok(());
    }
    if let Some(parent) = std::path::Path::new(&config.path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(feature = "sqlite")]
async fn connect_sqlite(config: &StorageConfig) -> Result<sqlx::SqlitePool> {
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    let in_memory = config.path == SQLITE_IN_MEMORY;

    let options = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(true);

    // Every connection to :memory: opens a separate database.
    let max_connections = if in_memory { 1 } else { config.max_connections };

    let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
    if in_memory {
        pool_options = pool_options.idle_timeout(None).max_lifetime(None);
    }

    let pool = pool_options
        .connect_with(options)
        .await?;

    Ok(pool)
}
