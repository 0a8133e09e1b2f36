//! AMQP (RabbitMQ) queue consumer.
//!
//! Consumes the readings queue with broker auto-acknowledgement: a message is
//! handled as soon as it is received, whatever happens downstream.

use deadpool_lapin::{Manager, Pool, PoolError};
use futures::StreamExt;
use lapin::{
    options::{BasicConsumeOptions, QueueDeclareOptions},
    types::FieldTable,
};
use tokio::sync::watch;
use tracing::{debug, error, info};

use super::{BusError, ConsumerState, MessagingConfig, Result};
use crate::pipeline::{Outcome, ReadingPipeline};
use crate::utils::retry::retry_forever;

/// Long-lived consumer of the readings queue.
///
/// Messages are processed one at a time, so per-device order from the queue is
/// kept through the store write and the broadcast handoff.
pub struct AmqpConsumer {
    pool: Pool,
    config: MessagingConfig,
    pipeline: ReadingPipeline,
    state: watch::Sender<ConsumerState>,
}

impl AmqpConsumer {
    /// Create a consumer. No connection is made until `run`.
    pub fn new(
        config: MessagingConfig,
        pipeline: ReadingPipeline,
        state: watch::Sender<ConsumerState>,
    ) -> Result<Self> {
        let manager = Manager::new(config.url.clone(), Default::default());
        let pool = Pool::builder(manager)
            .max_size(1)
            .build()
            .map_err(|e| BusError::Connection(format!("Failed to create pool: {}", e)))?;

        state.send_replace(ConsumerState::Disconnected);

        Ok(Self {
            pool,
            config,
            pipeline,
            state,
        })
    }

    /// Observe state transitions.
    pub fn state(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: ConsumerState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "Consumer state changed");
        }
    }

    /// Consume forever, reconnecting after a fixed delay on any failure.
    pub async fn run(&self) {
        let queue = &self.config.queue;
        let delay = self.config.reconnect_delay();

        loop {
            self.set_state(ConsumerState::Connecting);

            match retry_forever("amqp", delay, || self.setup_consumer()).await {
                Ok(consumer) => {
                    self.set_state(ConsumerState::Subscribed);
                    info!(queue = %queue, "Consumer connected, processing messages");

                    self.consume(consumer).await;

                    info!(queue = %queue, "Consumer stream ended, reconnecting...");
                }
                Err(e) => {
                    error!(error = %e, queue = %queue, "Failed to set up consumer");
                }
            }

            self.set_state(ConsumerState::Disconnected);
            tokio::time::sleep(delay).await;
        }
    }

    /// Process deliveries until the stream ends or errors.
    async fn consume(&self, mut consumer: lapin::Consumer) {
        let mut processed: u64 = 0;
        let mut discarded: u64 = 0;

        while let Some(delivery) = consumer.next().await {
            match delivery {
                Ok(delivery) => {
                    self.set_state(ConsumerState::Processing);
                    match self.pipeline.handle(&delivery.data).await {
                        Outcome::Processed { .. } => processed += 1,
                        Outcome::Discarded => discarded += 1,
                    }
                    self.set_state(ConsumerState::Subscribed);
                }
                Err(e) => {
                    error!(error = %e, "Consumer delivery error, will reconnect");
                    break;
                }
            }
        }

        debug!(processed, discarded, "Consumer session finished");
    }

    /// Set up channel, durable queue, and consumer.
    async fn setup_consumer(&self) -> Result<lapin::Consumer> {
        let conn = self.pool.get().await.map_err(|e: PoolError| {
            BusError::Connection(format!("Failed to get connection from pool: {}", e))
        })?;

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| BusError::Connection(format!("Failed to create channel: {}", e)))?;

        // Same declaration as the producer, so either side may start first.
        channel
            .queue_declare(
                &self.config.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to declare queue: {}", e)))?;

        let consumer = channel
            .basic_consume(
                &self.config.queue,
                &self.config.consumer_tag,
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to start consumer: {}", e)))?;

        Ok(consumer)
    }
}
