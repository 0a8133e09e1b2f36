//! Dedicated consumer thread.
//!
//! The consumer gets its own OS thread driving a single-threaded runtime, so
//! broker I/O never competes with subscriber delivery. It opens its own store
//! pool and reaches the broadcaster only through the `Bridge`.

use std::thread;

use tokio::sync::{oneshot, watch};
use tracing::{error, info};

use super::{AmqpConsumer, BusError, ConsumerState, MessagingConfig, Result};
use crate::broadcast::Bridge;
use crate::pipeline::ReadingPipeline;
use crate::storage::{init_storage, StorageConfig};

const THREAD_NAME: &str = "readings-consumer";

/// Handle to a running consumer thread.
pub struct ConsumerWorker {
    /// Current consumer state.
    pub state: watch::Receiver<ConsumerState>,
    /// Resolves if the worker gives up. The sender is dropped if the thread
    /// exits any other way.
    pub failure: oneshot::Receiver<BusError>,
    pub thread: thread::JoinHandle<()>,
}

/// Start the consumer on its own thread.
///
/// Only fails if the thread cannot be spawned. Setup errors inside the thread
/// are reported through `ConsumerWorker::failure`.
pub fn spawn_worker(
    messaging: MessagingConfig,
    storage: StorageConfig,
    bridge: Bridge,
) -> std::io::Result<ConsumerWorker> {
    let (state_tx, state_rx) = watch::channel(ConsumerState::Disconnected);
    let (failure_tx, failure_rx) = oneshot::channel();

    let thread = thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || {
            if let Err(e) = run_worker(messaging, storage, bridge, state_tx) {
                error!(error = %e, "Consumer worker failed");
                let _ = failure_tx.send(e);
            }
        })?;

    Ok(ConsumerWorker {
        state: state_rx,
        failure: failure_rx,
        thread,
    })
}

fn run_worker(
    messaging: MessagingConfig,
    storage: StorageConfig,
    bridge: Bridge,
    state: watch::Sender<ConsumerState>,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let store = init_storage(&storage).await?;
        let pipeline = ReadingPipeline::new(store, bridge);
        let consumer = AmqpConsumer::new(messaging, pipeline, state)?;

        info!(thread = THREAD_NAME, "Consumer worker started");
        consumer.run().await;
        Ok::<(), BusError>(())
    })
}
