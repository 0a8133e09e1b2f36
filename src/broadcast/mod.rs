//! Live fan-out of accepted readings to per-device subscribers.
//!
//! The `Broadcaster` owns the device → subscribers mapping and is only ever
//! touched by its own task. Everything else talks to it through a `Bridge`,
//! which turns calls into commands on an unbounded channel. The consumer
//! thread can therefore publish without blocking, and the mapping needs no
//! lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

mod bridge;

pub use bridge::Bridge;

/// Outbound frame: the inbound payload text, shared between subscribers.
pub type Frame = Arc<str>;

/// Sending half handed over by a subscriber connection.
pub type SubscriberSender = mpsc::Sender<Frame>;

/// Identifies one registration, so removal is exact-handle removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Requests marshaled from other domains to the broadcaster task.
#[derive(Debug)]
pub enum Command {
    Subscribe {
        id: SubscriptionId,
        device_id: String,
        sender: SubscriberSender,
    },
    Unsubscribe {
        id: SubscriptionId,
    },
    Publish {
        device_id: String,
        frame: Frame,
    },
    Counts {
        reply: oneshot::Sender<HashMap<String, usize>>,
    },
}

/// Subscriber registration.
struct Subscriber {
    id: SubscriptionId,
    sender: SubscriberSender,
}

/// Per-device subscriber registry with deliver-or-evict publishing.
#[derive(Default)]
pub struct Broadcaster {
    /// Map of device_id -> list of subscribers
    subscriptions: HashMap<String, Vec<Subscriber>>,
    /// Reverse index so unsubscribe only needs the id
    devices: HashMap<SubscriptionId, String>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber, lazily creating the device entry.
    pub fn subscribe(&mut self, id: SubscriptionId, device_id: String, sender: SubscriberSender) {
        debug!(subscription = %id, device_id = %device_id, "Subscriber registered");
        self.devices.insert(id, device_id.clone());
        self.subscriptions
            .entry(device_id)
            .or_default()
            .push(Subscriber { id, sender });
    }

    /// Remove exactly the given subscription. Returns false if it was unknown
    /// (already evicted or never registered).
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let Some(device_id) = self.devices.remove(&id) else {
            return false;
        };

        if let Some(subscribers) = self.subscriptions.get_mut(&device_id) {
            subscribers.retain(|s| s.id != id);
            if subscribers.is_empty() {
                self.subscriptions.remove(&device_id);
                debug!(
                    device_id = %device_id,
                    "Removed last subscriber, device entry cleaned up"
                );
            }
        }

        debug!(subscription = %id, device_id = %device_id, "Subscriber unregistered");
        true
    }

    /// Deliver the frame to every subscriber of the device.
    ///
    /// Each delivery is attempted independently. A closed or full subscriber
    /// channel is a failed delivery and evicts that subscriber. Returns the
    /// number of successful deliveries.
    pub fn publish(&mut self, device_id: &str, frame: &Frame) -> usize {
        let Some(subscribers) = self.subscriptions.get_mut(device_id) else {
            return 0;
        };

        let mut evicted = Vec::new();
        subscribers.retain(|sub| match sub.sender.try_send(Arc::clone(frame)) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    device_id = %device_id,
                    subscription = %sub.id,
                    error = %e,
                    "Delivery failed, evicting subscriber"
                );
                evicted.push(sub.id);
                false
            }
        });
        let sent = subscribers.len();

        if subscribers.is_empty() {
            self.subscriptions.remove(device_id);
            debug!(
                device_id = %device_id,
                "No subscribers remaining, removed device entry"
            );
        }
        for id in evicted {
            self.devices.remove(&id);
        }

        debug!(device_id = %device_id, sent, "Reading delivered to subscribers");
        sent
    }

    pub fn subscriber_count(&self, device_id: &str) -> usize {
        self.subscriptions.get(device_id).map_or(0, Vec::len)
    }

    /// Number of devices with at least one subscriber.
    pub fn device_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn counts(&self) -> HashMap<String, usize> {
        self.subscriptions
            .iter()
            .map(|(device_id, subs)| (device_id.clone(), subs.len()))
            .collect()
    }

    /// Apply one marshaled command.
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Subscribe {
                id,
                device_id,
                sender,
            } => self.subscribe(id, device_id, sender),
            Command::Unsubscribe { id } => {
                self.unsubscribe(id);
            }
            Command::Publish { device_id, frame } => {
                self.publish(&device_id, &frame);
            }
            Command::Counts { reply } => {
                let _ = reply.send(self.counts());
            }
        }
    }

    /// Drain commands until every sender is gone.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        info!("Broadcaster started");
        while let Some(command) = commands.recv().await {
            self.apply(command);
        }
        info!("Broadcaster stopped");
    }

    /// Attach to the bridge and spawn the broadcaster task on the current runtime.
    ///
    /// If the bridge already has a broadcaster, this one exits immediately.
    pub fn start(self, bridge: &Bridge) -> JoinHandle<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        if !bridge.attach(tx) {
            warn!("Bridge already has a broadcaster attached");
        }
        tokio::spawn(self.run(rx))
    }
}
