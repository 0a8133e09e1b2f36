//! Handoff from the consumer thread to the delivery runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::{Command, Frame, SubscriberSender, SubscriptionId};

#[derive(Default)]
struct Inner {
    commands: OnceLock<mpsc::UnboundedSender<Command>>,
    next_id: AtomicU64,
}

/// Cloneable handle to the broadcaster task.
///
/// Sends never block and never wait for delivery. Commands from one caller
/// are applied in the order they were sent. Before a broadcaster is attached,
/// and after its task has exited, requests are dropped.
#[derive(Clone, Default)]
pub struct Bridge {
    inner: Arc<Inner>,
}

impl Bridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect the broadcaster's command channel. Only the first call wins.
    pub(crate) fn attach(&self, commands: mpsc::UnboundedSender<Command>) -> bool {
        self.inner.commands.set(commands).is_ok()
    }

    /// Whether a broadcaster is attached and still draining commands.
    pub fn is_running(&self) -> bool {
        self.inner
            .commands
            .get()
            .is_some_and(|tx| !tx.is_closed())
    }

    fn send(&self, command: Command) -> bool {
        let Some(tx) = self.inner.commands.get() else {
            debug!("No broadcaster attached, dropping request");
            return false;
        };
        if tx.send(command).is_err() {
            debug!("Broadcaster stopped, dropping request");
            return false;
        }
        true
    }

    /// Queue a publish for the device. Returns false if it was dropped.
    pub fn publish(&self, device_id: &str, frame: Frame) -> bool {
        self.send(Command::Publish {
            device_id: device_id.to_string(),
            frame,
        })
    }

    /// Register a subscriber for the device.
    ///
    /// The id is allocated here, so this returns without a round trip.
    /// Returns `None` when no broadcaster is available.
    pub fn subscribe(&self, device_id: &str, sender: SubscriberSender) -> Option<SubscriptionId> {
        let id = SubscriptionId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.send(Command::Subscribe {
            id,
            device_id: device_id.to_string(),
            sender,
        })
        .then_some(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.send(Command::Unsubscribe { id })
    }

    /// Per-device subscriber counts, empty if no broadcaster is available.
    pub async fn subscriber_counts(&self) -> HashMap<String, usize> {
        let (reply, rx) = oneshot::channel();
        if !self.send(Command::Counts { reply }) {
            return HashMap::new();
        }
        rx.await.unwrap_or_default()
    }
}
