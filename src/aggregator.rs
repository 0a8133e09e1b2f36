//! Hourly rollup rule.
//!
//! A reading contributes its value to the bucket `(device_id, hour_start)`,
//! where `hour_start` truncates the producer timestamp to the hour in epoch
//! milliseconds. The SQL form of the rule is a single conflict-resolving
//! insert, so concurrent writers to one bucket never lose an addition.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use sea_query::{Expr, InsertStatement, OnConflict, Order, Query, SelectStatement};
use serde::Serialize;

use crate::reading::Reading;
use crate::storage::schema::{HourlyConsumption, Measurements};

/// Milliseconds in one hour.
pub const HOUR_MILLIS: i64 = 3_600_000;
/// Milliseconds in one calendar day.
pub const DAY_MILLIS: i64 = 24 * HOUR_MILLIS;

/// Date format accepted by the hourly query.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Start of the hour containing `timestamp`, or `None` when that hour would
/// begin below `i64::MIN`.
pub fn checked_hour_start(timestamp: i64) -> Option<i64> {
    timestamp.checked_sub(timestamp.rem_euclid(HOUR_MILLIS))
}

/// Truncate a millisecond timestamp to the start of its hour.
///
/// Saturates at `i64::MIN` for the partial hour at the bottom of the range;
/// `reading::decode` rejects those timestamps.
pub fn hour_start(timestamp: i64) -> i64 {
    checked_hour_start(timestamp).unwrap_or(i64::MIN)
}

/// Identity of an hourly bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    pub device_id: String,
    pub hour_start: i64,
}

impl BucketKey {
    pub fn for_reading(reading: &Reading) -> Self {
        Self {
            device_id: reading.device_id.clone(),
            hour_start: hour_start(reading.timestamp),
        }
    }
}

/// One row of the hourly query, serialized with the field names clients expect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyBucket {
    #[serde(rename = "hour")]
    pub hour_start: i64,
    #[serde(rename = "total_consumption")]
    pub total_value: f64,
}

/// In-memory form of the rollup, keyed the same way as the bucket table.
#[derive(Debug, Default, Clone)]
pub struct Rollup {
    buckets: BTreeMap<BucketKey, f64>,
}

impl Rollup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert-or-add the reading into its bucket.
    pub fn apply(&mut self, reading: &Reading) {
        *self
            .buckets
            .entry(BucketKey::for_reading(reading))
            .or_insert(0.0) += reading.value;
    }

    pub fn total(&self, key: &BucketKey) -> Option<f64> {
        self.buckets.get(key).copied()
    }

    /// Buckets for one device within `[start, end)`, ascending by hour.
    pub fn range(&self, device_id: &str, start: i64, end: i64) -> Vec<HourlyBucket> {
        self.buckets
            .iter()
            .filter(|(key, _)| {
                key.device_id == device_id && key.hour_start >= start && key.hour_start < end
            })
            .map(|(key, total)| HourlyBucket {
                hour_start: key.hour_start,
                total_value: *total,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Millisecond window `[start, end)` of a `YYYY-MM-DD` day in UTC.
///
/// Returns `None` for anything that is not a valid calendar date.
pub fn day_window(date: &str) -> Option<(i64, i64)> {
    let day = NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
    let start = day.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis();
    Some((start, start + DAY_MILLIS))
}

/// Append the raw reading row.
pub fn raw_insert(reading: &Reading) -> InsertStatement {
    Query::insert()
        .into_table(Measurements::Table)
        .columns([
            Measurements::Timestamp,
            Measurements::DeviceId,
            Measurements::MeasurementValue,
        ])
        .values_panic([
            reading.timestamp.into(),
            reading.device_id.as_str().into(),
            reading.value.into(),
        ])
        .to_owned()
}

/// Insert the bucket or add the reading's value to the existing total.
pub fn bucket_upsert(reading: &Reading) -> InsertStatement {
    let key = BucketKey::for_reading(reading);

    Query::insert()
        .into_table(HourlyConsumption::Table)
        .columns([
            HourlyConsumption::DeviceId,
            HourlyConsumption::Hour,
            HourlyConsumption::TotalConsumption,
        ])
        .values_panic([
            key.device_id.into(),
            key.hour_start.into(),
            reading.value.into(),
        ])
        .on_conflict(
            OnConflict::columns([HourlyConsumption::DeviceId, HourlyConsumption::Hour])
                .value(
                    HourlyConsumption::TotalConsumption,
                    Expr::cust(
                        "hourly_consumption.total_consumption + excluded.total_consumption",
                    ),
                )
                .to_owned(),
        )
        .to_owned()
}

/// Select a device's buckets within `[start, end)`, ascending by hour.
pub fn bucket_query(device_id: &str, start: i64, end: i64) -> SelectStatement {
    Query::select()
        .columns([HourlyConsumption::Hour, HourlyConsumption::TotalConsumption])
        .from(HourlyConsumption::Table)
        .and_where(Expr::col(HourlyConsumption::DeviceId).eq(device_id))
        .and_where(Expr::col(HourlyConsumption::Hour).gte(start))
        .and_where(Expr::col(HourlyConsumption::Hour).lt(end))
        .order_by(HourlyConsumption::Hour, Order::Asc)
        .to_owned()
}
