//! Storage trait definitions.
//!
//! These traits define the interface for storage backends, enabling swapping
//! between different implementations without changing business logic.

use async_trait::async_trait;

use crate::domain::{Document, Filter, QuerySpec};
use crate::error::StorageResult;

/// Named counter operations.
///
/// Counters are created implicitly at zero and only ever increase.
#[async_trait]
pub trait CounterStorage: Send + Sync {
    /// Read the counter's committed value, creating it at zero if absent.
    ///
    /// Idempotent and non-advancing. Concurrent callers may observe the same value.
    async fn peek_or_create(&self, name: &str) -> StorageResult<u64>;

    /// Atomically add one to the counter, creating it at zero first if absent,
    /// and return the new value.
    ///
    /// Concurrent callers always receive distinct values.
    async fn increment(&self, name: &str) -> StorageResult<u64>;
}

/// Document collection operations.
#[async_trait]
pub trait DocumentStorage: Send + Sync {
    /// Insert a fully stamped document (it already carries `_id`).
    async fn insert(&self, collection: &str, document: Document) -> StorageResult<Document>;

    /// Fetch a document by `_id`, soft-deleted or not.
    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Document>>;

    /// Merge top-level fields into a stored document and return the result.
    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> StorageResult<Option<Document>>;

    /// Run a listing query: filter (including relation filters), sort,
    /// skip/limit, then project. Joins are not resolved here.
    async fn find(&self, query: &QuerySpec) -> StorageResult<Vec<Document>>;

    /// Count documents matching a filter.
    async fn count(&self, collection: &str, filter: &Filter) -> StorageResult<u64>;

    /// Fetch documents by `_id`; unknown ids are skipped.
    async fn find_by_ids(&self, collection: &str, ids: &[String]) -> StorageResult<Vec<Document>>;

    /// Case-insensitive substring search over `fields`, excluding soft-deleted
    /// documents.
    async fn search(
        &self,
        collection: &str,
        keyword: &str,
        fields: &[String],
        limit: u64,
    ) -> StorageResult<Vec<Document>>;
}

/// Combined storage trait for all storage operations.
#[async_trait]
pub trait Storage: CounterStorage + DocumentStorage {
    /// Check if the storage backend is healthy and reachable.
    async fn health_check(&self) -> StorageResult<()>;

    /// Get the storage backend name.
    fn backend_name(&self) -> &'static str;
}

