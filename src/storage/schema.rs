//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Raw readings table schema (append-only).
#[derive(Iden)]
pub enum Measurements {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "timestamp"]
    Timestamp,
    #[iden = "device_id"]
    DeviceId,
    #[iden = "measurement_value"]
    MeasurementValue,
}

/// Hourly bucket table schema.
#[derive(Iden)]
pub enum HourlyConsumption {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "device_id"]
    DeviceId,
    #[iden = "hour"]
    Hour,
    #[iden = "total_consumption"]
    TotalConsumption,
}

/// SQLite schema, one statement per entry.
pub const SQLITE_SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS measurements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp INTEGER NOT NULL,
    device_id TEXT NOT NULL,
    measurement_value REAL NOT NULL
)"#,
    r#"
CREATE TABLE IF NOT EXISTS hourly_consumption (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    device_id TEXT NOT NULL,
    hour INTEGER NOT NULL,
    total_consumption REAL NOT NULL,
    UNIQUE (device_id, hour)
)"#,
];

/// PostgreSQL schema, one statement per entry.
pub const POSTGRES_SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS measurements (
    id BIGSERIAL PRIMARY KEY,
    timestamp BIGINT NOT NULL,
    device_id TEXT NOT NULL,
    measurement_value DOUBLE PRECISION NOT NULL
)"#,
    r#"
CREATE TABLE IF NOT EXISTS hourly_consumption (
    id BIGSERIAL PRIMARY KEY,
    device_id TEXT NOT NULL,
    hour BIGINT NOT NULL,
    total_consumption DOUBLE PRECISION NOT NULL,
    UNIQUE (device_id, hour)
)"#,
];
