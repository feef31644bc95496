//! File-based storage backend.
//!
//! This backend stores data as JSON files with file locking for atomic operations.
//! Suitable for development and single-node deployments.
//!
//! Directory structure:
//! ```text
//! data/
//! ├── counters/
//! │   └── {name}.json
//! └── collections/
//!     └── {collection}/
//!         └── {id}.json
//! ```

mod counter;
mod document;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::FileStorageConfig;
use crate::domain::{Document, Filter, QuerySpec};
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::{CounterStorage, DocumentStorage, Storage};

pub use counter::FileCounterStorage;
pub use document::FileDocumentStorage;

/// File-based storage implementation.
pub struct FileStorage {
    /// Base data directory.
    base_dir: PathBuf,
    /// Counter storage.
    counter_storage: FileCounterStorage,
    /// Document storage.
    document_storage: FileDocumentStorage,
}

impl FileStorage {
    /// Create a new file storage instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directories cannot be created.
    pub fn new(config: &FileStorageConfig) -> StorageResult<Self> {
        let base_dir = config.data_dir.clone();

        Self::ensure_directories(&base_dir)?;

        Ok(Self {
            counter_storage: FileCounterStorage::new(base_dir.join("counters")),
            document_storage: FileDocumentStorage::new(base_dir.join("collections")),
            base_dir,
        })
    }

    /// Ensure all required directories exist.
    fn ensure_directories(base_dir: &Path) -> StorageResult<()> {
        let dirs = [
            base_dir.to_path_buf(),
            base_dir.join("counters"),
            base_dir.join("collections"),
        ];

        for dir in &dirs {
            std::fs::create_dir_all(dir).map_err(|e| {
                StorageError::FileIO(format!("Failed to create directory {dir:?}: {e}"))
            })?;
        }

        Ok(())
    }
}

/// Map a counter, collection or document name onto a safe file name.
pub(super) fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl CounterStorage for FileStorage {
    async fn peek_or_create(&self, name: &str) -> StorageResult<u64> {
        self.counter_storage.peek_or_create(name).await
    }

    async fn increment(&self, name: &str) -> StorageResult<u64> {
        self.counter_storage.increment(name).await
    }
}

#[async_trait]
impl DocumentStorage for FileStorage {
    async fn insert(&self, collection: &str, document: Document) -> StorageResult<Document> {
        self.document_storage.insert(collection, document).await
    }

    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Document>> {
        self.document_storage.get(collection, id).await
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> StorageResult<Option<Document>> {
        self.document_storage
            .update_fields(collection, id, fields)
            .await
    }

    async fn find(&self, query: &QuerySpec) -> StorageResult<Vec<Document>> {
        self.document_storage.find(query).await
    }

    async fn count(&self, collection: &str, filter: &Filter) -> StorageResult<u64> {
        self.document_storage.count(collection, filter).await
    }

    async fn find_by_ids(&self, collection: &str, ids: &[String]) -> StorageResult<Vec<Document>> {
        self.document_storage.find_by_ids(collection, ids).await
    }

    async fn search(
        &self,
        collection: &str,
        keyword: &str,
        fields: &[String],
        limit: u64,
    ) -> StorageResult<Vec<Document>> {
        self.document_storage
            .search(collection, keyword, fields, limit)
            .await
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn health_check(&self) -> StorageResult<()> {
        if !self.base_dir.exists() {
            return Err(StorageError::Unavailable);
        }

        let test_file = self.base_dir.join(".health_check");
        tokio::fs::write(&test_file, b"ok")
            .await
            .map_err(|e| StorageError::FileIO(format!("Health check failed: {e}")))?;
        tokio::fs::remove_file(&test_file)
            .await
            .map_err(|e| StorageError::FileIO(format!("Health check cleanup failed: {e}")))?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::DELETED_AT_FIELD;
    use crate::domain::query::{Condition, RangeOp, RangeOperand, Scalar};
    use crate::domain::{FieldFilter, FieldPath, PageRequest, Projection, SortKey};
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn create_test_storage() -> (FileStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = FileStorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
        };
        let storage = FileStorage::new(&config).unwrap();
        (storage, temp_dir)
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    async fn seed_scopes(storage: &FileStorage) {
        let scopes = [
            json!({"_id": "s1", "title": "Roof", "status": "approved", "progress": 80, "createdAt": "2025-01-01T00:00:00.000Z", "client": "c1"}),
            json!({"_id": "s2", "title": "Wall", "status": "draft", "progress": 20, "createdAt": "2025-01-02T00:00:00.000Z", "client": "c2"}),
            json!({"_id": "s3", "title": "Floor", "status": "approved", "progress": 50, "createdAt": "2025-01-03T00:00:00.000Z", "client": "c1"}),
        ];
        for scope in scopes {
            storage.insert("scopes", doc(scope)).await.unwrap();
        }
        storage
            .insert("clients", doc(json!({"_id": "c1", "clientName": "Acme"})))
            .await
            .unwrap();
        storage
            .insert("clients", doc(json!({"_id": "c2", "clientName": "Globex"})))
            .await
            .unwrap();
    }

    fn ids(documents: &[Document]) -> Vec<&str> {
        documents
            .iter()
            .filter_map(|d| d.get("_id").and_then(Value::as_str))
            .collect()
    }

    #[tokio::test]
    async fn test_health_check() {
        let (storage, _temp) = create_test_storage();
        assert!(storage.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_counter_operations() {
        let (storage, _temp) = create_test_storage();

        assert_eq!(storage.peek_or_create("Scope").await.unwrap(), 0);
        assert_eq!(storage.increment("Scope").await.unwrap(), 1);
        assert_eq!(storage.peek_or_create("Scope").await.unwrap(), 1);
        assert_eq!(storage.increment("Task").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_insert_get_and_duplicate() {
        let (storage, _temp) = create_test_storage();

        storage
            .insert("users", doc(json!({"_id": "u1", "name": "Ana"})))
            .await
            .unwrap();
        let loaded = storage.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(loaded.get("name"), Some(&json!("Ana")));
        assert!(storage.get("users", "missing").await.unwrap().is_none());

        let duplicate = storage
            .insert("users", doc(json!({"_id": "u1", "name": "Bo"})))
            .await;
        assert!(matches!(duplicate, Err(StorageError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_ids_sharing_a_file_name_do_not_alias() {
        let (storage, _temp) = create_test_storage();

        storage
            .insert("users", doc(json!({"_id": "a.b", "name": "Ana"})))
            .await
            .unwrap();

        assert!(storage.get("users", "a_b").await.unwrap().is_none());
        assert!(
            storage
                .find_by_ids("users", &["a_b".to_string()])
                .await
                .unwrap()
                .is_empty()
        );
        assert!(
            storage
                .update_fields("users", "a_b", doc(json!({"name": "Bo"})))
                .await
                .unwrap()
                .is_none()
        );

        let loaded = storage.get("users", "a.b").await.unwrap().unwrap();
        assert_eq!(loaded.get("name"), Some(&json!("Ana")));

        let colliding = storage
            .insert("users", doc(json!({"_id": "a_b", "name": "Cy"})))
            .await;
        assert!(matches!(colliding, Err(StorageError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_find_filters_sorts_and_pages() {
        let (storage, _temp) = create_test_storage();
        seed_scopes(&storage).await;

        let mut query = QuerySpec::new("scopes").with_filter(FieldFilter::new(
            FieldPath::field("status"),
            Condition::Eq(Scalar::new("approved")),
        ));
        query.sort = vec![SortKey::parse("progress").unwrap()];
        let found = storage.find(&query).await.unwrap();
        assert_eq!(ids(&found), vec!["s3", "s1"]);

        let mut query = QuerySpec::new("scopes");
        query.sort = vec![SortKey::parse("-createdAt").unwrap()];
        query.page = PageRequest { page: 2, limit: 2 };
        let found = storage.find(&query).await.unwrap();
        assert_eq!(ids(&found), vec!["s1"]);
        assert_eq!(storage.count("scopes", &query.filter).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_find_with_range_and_projection() {
        let (storage, _temp) = create_test_storage();
        seed_scopes(&storage).await;

        let mut query = QuerySpec::new("scopes").with_filter(FieldFilter::new(
            FieldPath::field("progress"),
            Condition::Range {
                op: RangeOp::Gte,
                operand: RangeOperand::Number(50.0),
            },
        ));
        query.sort = vec![SortKey::parse("title").unwrap()];
        query.projection = Projection::Include(vec![FieldPath::field("title")]);

        let found = storage.find(&query).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(Value::Object(found[0].clone()), json!({"_id": "s3", "title": "Floor"}));
    }

    #[tokio::test]
    async fn test_relation_filter() {
        let (storage, _temp) = create_test_storage();
        seed_scopes(&storage).await;

        let mut query = QuerySpec::new("scopes");
        query.filter = query.filter.and_related(
            "client",
            "clients",
            FieldFilter::new(
                FieldPath::field("clientName"),
                Condition::Eq(Scalar::new("Acme")),
            ),
        );
        query.sort = vec![SortKey::parse("_id").unwrap()];

        let found = storage.find(&query).await.unwrap();
        assert_eq!(ids(&found), vec!["s1", "s3"]);
        assert_eq!(storage.count("scopes", &query.filter).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_fields_and_search() {
        let (storage, _temp) = create_test_storage();
        seed_scopes(&storage).await;

        let fields = ["title".to_string()];
        let found = storage.search("scopes", "oo", &fields, 10).await.unwrap();
        assert_eq!(ids(&found), vec!["s3", "s1"]);

        let mut patch = Document::new();
        patch.insert(
            DELETED_AT_FIELD.to_string(),
            json!("2025-02-01T00:00:00.000Z"),
        );
        let updated = storage.update_fields("scopes", "s1", patch).await.unwrap();
        assert!(updated.unwrap().contains_key(DELETED_AT_FIELD));

        let found = storage.search("scopes", "oo", &fields, 10).await.unwrap();
        assert_eq!(ids(&found), vec!["s3"]);

        assert!(
            storage
                .update_fields("scopes", "missing", Document::new())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_find_by_ids_skips_unknown() {
        let (storage, _temp) = create_test_storage();
        seed_scopes(&storage).await;

        let found = storage
            .find_by_ids("clients", &["c2".to_string(), "nope".to_string()])
            .await
            .unwrap();
        assert_eq!(ids(&found), vec!["c2"]);
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("site_visits"), "site_visits");
        assert_eq!(sanitize_name("../etc"), "___etc");
    }
}
