//! Mock storage implementation for testing.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ReadingStore, Result, StorageError};
use crate::aggregator::{day_window, HourlyBucket, Rollup};
use crate::reading::Reading;

/// Mock reading store that keeps readings and buckets in memory.
#[derive(Default)]
pub struct MockReadingStore {
    readings: RwLock<Vec<Reading>>,
    rollup: RwLock<Rollup>,
    fail_on_record: RwLock<bool>,
    fail_on_query: RwLock<bool>,
}

impl MockReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_record(&self, fail: bool) {
        *self.fail_on_record.write().await = fail;
    }

    pub async fn set_fail_on_query(&self, fail: bool) {
        *self.fail_on_query.write().await = fail;
    }

    /// Raw readings recorded so far, in arrival order.
    pub async fn readings(&self) -> Vec<Reading> {
        self.readings.read().await.clone()
    }

    pub async fn bucket_count(&self) -> usize {
        self.rollup.read().await.len()
    }
}

#[async_trait]
impl ReadingStore for MockReadingStore {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn record(&self, reading: &Reading) -> Result<()> {
        if *self.fail_on_record.read().await {
            return Err(StorageError::Injected("record".to_string()));
        }
        let mut readings = self.readings.write().await;
        let mut rollup = self.rollup.write().await;
        readings.push(reading.clone());
        rollup.apply(reading);
        Ok(())
    }

    async fn hourly_consumption(&self, device_id: &str, date: &str) -> Result<Vec<HourlyBucket>> {
        if *self.fail_on_query.read().await {
            return Err(StorageError::Injected("hourly_consumption".to_string()));
        }
        let Some((start, end)) = day_window(date) else {
            return Ok(Vec::new());
        };
        Ok(self.rollup.read().await.range(device_id, start, end))
    }
}
