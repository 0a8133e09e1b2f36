//! Monitoring - device reading ingestion, hourly rollup, and live fan-out.
//!
//! Readings arrive on a durable queue, are recorded together with their
//! hourly bucket, and are republished to WebSocket subscribers of the same
//! device. The queue consumer and the subscriber-facing server run on
//! separate runtimes joined by [`broadcast::Bridge`].

pub mod aggregator;
pub mod broadcast;
pub mod bus;
pub mod config;
pub mod pipeline;
pub mod reading;
pub mod server;
pub mod storage;
pub mod utils;
