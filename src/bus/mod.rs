//! Queue side of the pipeline.
//!
//! This module contains:
//! - `AmqpConsumer`: durable-queue consumer with reconnection
//! - `spawn_worker`: runs the consumer on its own thread and runtime
//! - Messaging configuration and consumer state

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::storage::StorageError;

pub mod amqp;
pub mod worker;

pub use amqp::AmqpConsumer;
pub use worker::{spawn_worker, ConsumerWorker};

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur during bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Consumer lifecycle.
///
/// `Disconnected → Connecting → Subscribed ⇄ Processing`, back to
/// `Disconnected` on any connection-level failure. There is no terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConsumerState {
    #[default]
    Disconnected,
    Connecting,
    Subscribed,
    Processing,
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsumerState::Disconnected => "disconnected",
            ConsumerState::Connecting => "connecting",
            ConsumerState::Subscribed => "subscribed",
            ConsumerState::Processing => "processing",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Queue consumer configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// AMQP connection URL.
    pub url: String,
    /// Durable queue carrying readings.
    pub queue: String,
    /// Consumer tag announced to the broker.
    pub consumer_tag: String,
    /// Fixed delay before reconnecting to the broker.
    pub reconnect_delay_secs: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            url: "amqp://localhost:5672/%2f".to_string(),
            queue: "measurements.queue".to_string(),
            consumer_tag: "monitoring-consumer".to_string(),
            reconnect_delay_secs: 5,
        }
    }
}

impl MessagingConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messaging_config_default() {
        let config = MessagingConfig::default();
        assert_eq!(config.queue, "measurements.queue");
        assert_eq!(config.reconnect_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_consumer_state_starts_disconnected() {
        assert_eq!(ConsumerState::default(), ConsumerState::Disconnected);
        assert_eq!(ConsumerState::Processing.to_string(), "processing");
    }
}
