//! ReadingStore interface tests.
//!
//! These tests verify the contract of the ReadingStore trait.
//! Each storage implementation should run these tests.

use futures::future::join_all;
use uuid::Uuid;

use monitoring::aggregator::{HourlyBucket, HOUR_MILLIS};
use monitoring::reading::Reading;
use monitoring::storage::ReadingStore;

/// 2023-11-14T22:13:20Z
pub const T0: i64 = 1_700_000_000_000;
/// Start of the hour containing `T0`.
pub const T0_HOUR: i64 = 1_699_999_200_000;
/// Calendar day of `T0` in UTC.
pub const T0_DATE: &str = "2023-11-14";

/// Fresh device id so tests sharing a database never see each other's rows.
pub fn device() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// ReadingStore::init tests
// =============================================================================

pub async fn test_init_is_idempotent<S: ReadingStore>(store: &S) {
    store.init().await.expect("second init should succeed");
}

// =============================================================================
// ReadingStore::record tests
// =============================================================================

pub async fn test_same_hour_readings_are_summed<S: ReadingStore>(store: &S) {
    let device = device();

    store
        .record(&Reading::new(&device, T0, 1.5))
        .await
        .expect("record should succeed");
    store
        .record(&Reading::new(&device, 1_700_002_000_000, 2.5))
        .await
        .expect("record should succeed");

    let buckets = store
        .hourly_consumption(&device, T0_DATE)
        .await
        .expect("query should succeed");

    assert_eq!(
        buckets,
        vec![HourlyBucket {
            hour_start: T0_HOUR,
            total_value: 4.0
        }]
    );
}

pub async fn test_different_hours_are_independent<S: ReadingStore>(store: &S) {
    let device = device();
    let earlier = T0_HOUR - HOUR_MILLIS;

    store.record(&Reading::new(&device, earlier + 10, 3.0)).await.unwrap();
    store.record(&Reading::new(&device, T0, 1.0)).await.unwrap();
    store.record(&Reading::new(&device, earlier + 20, 0.5)).await.unwrap();

    let buckets = store.hourly_consumption(&device, T0_DATE).await.unwrap();

    assert_eq!(
        buckets,
        vec![
            HourlyBucket {
                hour_start: earlier,
                total_value: 3.5
            },
            HourlyBucket {
                hour_start: T0_HOUR,
                total_value: 1.0
            },
        ],
        "buckets should be separate and ascending by hour"
    );
}

pub async fn test_devices_are_independent<S: ReadingStore>(store: &S) {
    let a = device();
    let b = device();

    store.record(&Reading::new(&a, T0, 1.0)).await.unwrap();
    store.record(&Reading::new(&b, T0, 7.0)).await.unwrap();

    let buckets = store.hourly_consumption(&a, T0_DATE).await.unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].total_value, 1.0);
}

pub async fn test_concurrent_writers_lose_no_updates<S: ReadingStore>(store: &S) {
    let device = device();
    let readings: Vec<Reading> = (0..20)
        .map(|i| Reading::new(&device, T0 + i, 0.5))
        .collect();

    let results = join_all(readings.iter().map(|r| store.record(r))).await;
    for result in results {
        result.expect("concurrent record should succeed");
    }

    let buckets = store.hourly_consumption(&device, T0_DATE).await.unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].total_value, 10.0);
}

pub async fn test_zero_value_creates_bucket<S: ReadingStore>(store: &S) {
    let device = device();

    store.record(&Reading::new(&device, T0, 0.0)).await.unwrap();

    let buckets = store.hourly_consumption(&device, T0_DATE).await.unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].total_value, 0.0);
}

// =============================================================================
// ReadingStore::hourly_consumption tests
// =============================================================================

pub async fn test_query_excludes_other_days<S: ReadingStore>(store: &S) {
    let device = device();

    store.record(&Reading::new(&device, T0, 1.0)).await.unwrap();

    let next_day = store.hourly_consumption(&device, "2023-11-15").await.unwrap();
    assert!(next_day.is_empty());

    let previous_day = store.hourly_consumption(&device, "2023-11-13").await.unwrap();
    assert!(previous_day.is_empty());
}

pub async fn test_query_empty_day<S: ReadingStore>(store: &S) {
    let buckets = store
        .hourly_consumption(&device(), "2020-01-01")
        .await
        .expect("empty day should not be an error");
    assert!(buckets.is_empty());
}

pub async fn test_query_malformed_date<S: ReadingStore>(store: &S) {
    let device = device();
    store.record(&Reading::new(&device, T0, 1.0)).await.unwrap();

    for date in ["", "yesterday", "2023-13-01", "2023-11-31", "14/11/2023"] {
        let buckets = store
            .hourly_consumption(&device, date)
            .await
            .expect("malformed date should not be an error");
        assert!(buckets.is_empty(), "date {:?} should yield no buckets", date);
    }
}

/// Run all ReadingStore tests against a store implementation.
#[macro_export]
macro_rules! run_reading_store_tests {
    ($store:expr) => {
        use $crate::storage::reading_store_tests::*;

        test_init_is_idempotent($store).await;
        println!("  test_init_is_idempotent: PASSED");

        // record tests
        test_same_hour_readings_are_summed($store).await;
        println!("  test_same_hour_readings_are_summed: PASSED");

        test_different_hours_are_independent($store).await;
        println!("  test_different_hours_are_independent: PASSED");

        test_devices_are_independent($store).await;
        println!("  test_devices_are_independent: PASSED");

        test_concurrent_writers_lose_no_updates($store).await;
        println!("  test_concurrent_writers_lose_no_updates: PASSED");

        test_zero_value_creates_bucket($store).await;
        println!("  test_zero_value_creates_bucket: PASSED");

        // query tests
        test_query_excludes_other_days($store).await;
        println!("  test_query_excludes_other_days: PASSED");

        test_query_empty_day($store).await;
        println!("  test_query_empty_day: PASSED");

        test_query_malformed_date($store).await;
        println!("  test_query_malformed_date: PASSED");
    };
}
