//! `PostgreSQL` storage backend.
//!
//! Counters live in a `counters` table and are advanced with a single upsert,
//! so concurrent callers always receive distinct values. Documents are stored
//! as JSONB in one `documents` table keyed by `(collection, id)`; listing
//! queries are compiled to SQL and executed by the database.

mod counter;
mod document;
mod sql;

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::PostgresStorageConfig;
use crate::error::StorageResult;
use crate::storage::traits::Storage;

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS counters (
        name TEXT PRIMARY KEY,
        sequence_value BIGINT NOT NULL DEFAULT 0,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        body JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (collection, id)
    )",
    "CREATE INDEX IF NOT EXISTS documents_body_idx ON documents USING GIN (body jsonb_path_ops)",
];

/// `PostgreSQL` storage implementation.
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Connect to the database and create the tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot connect or the schema cannot be created.
    pub async fn connect(config: &PostgresStorageConfig) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .test_before_acquire(true)
            .connect(&config.url)
            .await?;

        let storage = Self::from_pool(pool);
        storage.ensure_schema().await?;

        tracing::info!(
            max_connections = config.max_connections,
            "Connected to PostgreSQL storage"
        );

        Ok(storage)
    }

    /// Wrap an existing pool without touching the schema.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the tables used by this backend.
    ///
    /// # Errors
    ///
    /// Returns an error if a DDL statement fails.
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgresql"
    }
}
