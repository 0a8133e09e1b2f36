//! Shared storage integration tests.
//!
//! Tests the ReadingStore interface against all SQL implementations.
//! Each implementation module imports these test functions and runs them.

pub mod reading_store_tests;
