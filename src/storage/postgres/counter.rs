//! Counter operations on `PostgreSQL`.

use async_trait::async_trait;

use super::PostgresStorage;
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::CounterStorage;

fn to_sequence(name: &str, value: i64) -> StorageResult<u64> {
    u64::try_from(value)
        .map_err(|_| StorageError::Serialization(format!("counter '{name}' is negative: {value}")))
}

#[async_trait]
impl CounterStorage for PostgresStorage {
    async fn peek_or_create(&self, name: &str) -> StorageResult<u64> {
        sqlx::query(
            "INSERT INTO counters (name, sequence_value) VALUES ($1, 0) ON CONFLICT (name) DO NOTHING",
        )
        .bind(name)
        .execute(&self.pool)
        .await?;

        let value: i64 =
            sqlx::query_scalar("SELECT sequence_value FROM counters WHERE name = $1")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;

        to_sequence(name, value)
    }

    async fn increment(&self, name: &str) -> StorageResult<u64> {
        let value: i64 = sqlx::query_scalar(
            "INSERT INTO counters (name, sequence_value) VALUES ($1, 1)
             ON CONFLICT (name) DO UPDATE
             SET sequence_value = counters.sequence_value + 1, updated_at = now()
             RETURNING sequence_value",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        to_sequence(name, value)
    }
}
