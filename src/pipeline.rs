//! Per-message handling: decode, persist, broadcast.

use std::sync::Arc;

use tracing::{debug, error, warn, Instrument};

use crate::broadcast::Bridge;
use crate::reading::decode;
use crate::storage::ReadingStore;

/// What happened to one queue message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Decoded. `stored` reports the durable write, `broadcast` whether the
    /// publish was handed to a running broadcaster.
    Processed { stored: bool, broadcast: bool },
    /// Malformed payload, dropped without side effects.
    Discarded,
}

/// Decode → `ReadingStore::record` → `Bridge::publish`, one message at a time.
///
/// Store failures are logged and not retried. The publish happens whether or
/// not the write succeeded, and its result never affects the store path.
#[derive(Clone)]
pub struct ReadingPipeline {
    store: Arc<dyn ReadingStore>,
    bridge: Bridge,
}

impl ReadingPipeline {
    pub fn new(store: Arc<dyn ReadingStore>, bridge: Bridge) -> Self {
        Self { store, bridge }
    }

    pub fn store(&self) -> &Arc<dyn ReadingStore> {
        &self.store
    }

    pub async fn handle(&self, payload: &[u8]) -> Outcome {
        let message = match decode(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, bytes = payload.len(), "Discarding malformed reading");
                return Outcome::Discarded;
            }
        };

        let reading = &message.reading;
        let span = tracing::debug_span!(
            "pipeline.handle",
            device_id = %reading.device_id,
            timestamp = reading.timestamp
        );

        async {
            let stored = match self.store.record(reading).await {
                Ok(()) => true,
                Err(e) => {
                    error!(error = %e, "Failed to record reading, dropping it");
                    false
                }
            };

            let broadcast = self.bridge.publish(&reading.device_id, message.frame.clone());
            debug!(stored, broadcast, "Reading handled");

            Outcome::Processed { stored, broadcast }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::broadcast::Broadcaster;
    use crate::storage::MockReadingStore;

    fn pipeline_with(store: Arc<MockReadingStore>) -> (ReadingPipeline, Bridge) {
        let bridge = Bridge::new();
        (ReadingPipeline::new(store, bridge.clone()), bridge)
    }

    #[tokio::test]
    async fn test_valid_reading_is_stored_and_broadcast() {
        let store = Arc::new(MockReadingStore::new());
        let (pipeline, bridge) = pipeline_with(store.clone());
        let _task = Broadcaster::new().start(&bridge);

        let (tx, mut rx) = mpsc::channel(8);
        bridge.subscribe("A", tx).unwrap();

        let payload = br#"{"device_id":"A","timestamp":1700000000000,"value":1.5}"#;
        let outcome = pipeline.handle(payload).await;

        assert_eq!(
            outcome,
            Outcome::Processed {
                stored: true,
                broadcast: true
            }
        );
        assert_eq!(store.readings().await.len(), 1);
        assert_eq!(rx.recv().await.unwrap().as_bytes(), payload);
    }

    #[tokio::test]
    async fn test_malformed_reading_has_no_side_effects() {
        let store = Arc::new(MockReadingStore::new());
        let (pipeline, bridge) = pipeline_with(store.clone());
        let _task = Broadcaster::new().start(&bridge);

        let (tx, mut rx) = mpsc::channel(8);
        bridge.subscribe("A", tx).unwrap();

        let outcome = pipeline
            .handle(br#"{"device_id":"A","timestamp":1700000000000}"#)
            .await;

        assert_eq!(outcome, Outcome::Discarded);
        assert!(store.readings().await.is_empty());
        assert_eq!(store.bucket_count().await, 0);

        bridge.subscriber_counts().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_out_of_range_timestamp_is_discarded() {
        let store = Arc::new(MockReadingStore::new());
        let (pipeline, _bridge) = pipeline_with(store.clone());

        let outcome = pipeline
            .handle(br#"{"device_id":"A","timestamp":-9223372036854775808,"value":1.0}"#)
            .await;

        assert_eq!(outcome, Outcome::Discarded);
        assert!(store.readings().await.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_still_broadcasts() {
        let store = Arc::new(MockReadingStore::new());
        store.set_fail_on_record(true).await;
        let (pipeline, bridge) = pipeline_with(store.clone());
        let _task = Broadcaster::new().start(&bridge);

        let (tx, mut rx) = mpsc::channel(8);
        bridge.subscribe("A", tx).unwrap();

        let outcome = pipeline
            .handle(br#"{"device_id":"A","timestamp":0,"value":2.0}"#)
            .await;

        assert_eq!(
            outcome,
            Outcome::Processed {
                stored: false,
                broadcast: true
            }
        );
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_without_broadcaster_reading_is_still_stored() {
        let store = Arc::new(MockReadingStore::new());
        let (pipeline, _bridge) = pipeline_with(store.clone());

        let outcome = pipeline
            .handle(br#"{"device_id":"A","timestamp":0,"value":2.0}"#)
            .await;

        assert_eq!(
            outcome,
            Outcome::Processed {
                stored: true,
                broadcast: false
            }
        );
        assert_eq!(store.readings().await.len(), 1);
    }
}
