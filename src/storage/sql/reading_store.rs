//! Unified SQL ReadingStore implementation.
//!
//! Uses a macro to generate implementations for each SQL backend,
//! eliminating code duplication while maintaining type safety.

use std::marker::PhantomData;

use super::SqlDatabase;

/// SQL-based implementation of ReadingStore.
///
/// Each `record` call runs in one transaction: the raw row insert and the
/// bucket upsert become visible together or not at all. Conflicting bucket
/// writes are serialized by the database's own `ON CONFLICT` handling.
pub struct SqlReadingStore<DB: SqlDatabase> {
    pool: DB::Pool,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase> SqlReadingStore<DB> {
    /// Create a new SQL reading store with the given pool.
    pub fn new(pool: DB::Pool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &DB::Pool {
        &self.pool
    }
}

/// Macro to implement ReadingStore for a specific SQL backend.
macro_rules! impl_reading_store {
    ($db_type:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::storage::ReadingStore for SqlReadingStore<$db_type> {
            async fn init(&self) -> crate::storage::Result<()> {
                for statement in <$db_type as SqlDatabase>::SCHEMA.iter().copied() {
                    sqlx::query(statement).execute(&self.pool).await?;
                }
                Ok(())
            }

            async fn record(&self, reading: &crate::reading::Reading) -> crate::storage::Result<()> {
                use crate::aggregator::{bucket_upsert, raw_insert};

                let insert = <$db_type>::build_insert(raw_insert(reading));
                let upsert = <$db_type>::build_insert(bucket_upsert(reading));

                let mut tx = self.pool.begin().await?;
                sqlx::query(&insert).execute(&mut *tx).await?;
                sqlx::query(&upsert).execute(&mut *tx).await?;
                tx.commit().await?;

                Ok(())
            }

            async fn hourly_consumption(
                &self,
                device_id: &str,
                date: &str,
            ) -> crate::storage::Result<Vec<crate::aggregator::HourlyBucket>> {
                use sqlx::Row;

                use crate::aggregator::{bucket_query, day_window, HourlyBucket};

                let Some((start, end)) = day_window(date) else {
                    tracing::debug!(date = %date, "Malformed date, returning no buckets");
                    return Ok(Vec::new());
                };

                let sql = <$db_type>::build_select(bucket_query(device_id, start, end));
                let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

                let mut buckets = Vec::with_capacity(rows.len());
                for row in rows {
                    buckets.push(HourlyBucket {
                        hour_start: row.try_get("hour")?,
                        total_value: row.try_get("total_consumption")?,
                    });
                }

                Ok(buckets)
            }
        }
    };
}

// Generate implementations for each SQL backend
impl_reading_store!(super::postgres::Postgres, "postgres");
impl_reading_store!(super::sqlite::Sqlite, "sqlite");
