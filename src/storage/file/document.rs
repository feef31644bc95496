//! File-based document storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use tokio::sync::Mutex;

use super::sanitize_name;
use crate::domain::document::{document_id, is_deleted};
use crate::domain::query::DEFAULT_SORT;
use crate::domain::{Document, Filter, QuerySpec, RelationFilter, SortKey};
use crate::error::{StorageError, StorageResult};
use crate::storage::eval::{self, RelationMatches};
use crate::storage::traits::DocumentStorage;

/// File-based document storage implementation.
///
/// Each document is a JSON file under `collections/{collection}/{id}.json`.
/// Queries load the collection and evaluate in process.
pub struct FileDocumentStorage {
    /// Base directory for collections.
    collections_dir: PathBuf,
    /// Mutex for coordinating writes within this process.
    lock: Mutex<()>,
}

impl FileDocumentStorage {
    /// Create a new file document storage.
    #[must_use]
    pub fn new(collections_dir: PathBuf) -> Self {
        Self {
            collections_dir,
            lock: Mutex::new(()),
        }
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.collections_dir.join(sanitize_name(collection))
    }

    fn document_path(&self, collection: &str, id: &str) -> PathBuf {
        self.collection_dir(collection)
            .join(format!("{}.json", sanitize_name(id)))
    }

    /// Write a document with an exclusive lock.
    fn write_document(path: &Path, document: &Document) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        file.lock_exclusive()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        serde_json::to_writer_pretty(&file, document)?;
        file.sync_all()?;
        file.unlock()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        Ok(())
    }

    /// Read a document with a shared lock.
    fn read_document(path: &Path) -> StorageResult<Option<Document>> {
        if !path.exists() {
            return Ok(None);
        }

        let file = std::fs::File::open(path)?;
        file.lock_shared()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        let document: Document = serde_json::from_reader(&file)?;
        file.unlock()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        Ok(Some(document))
    }

    /// Read the document stored for `id`. Distinct ids can sanitise to the
    /// same file name, so the stored `_id` must match.
    fn read_by_id(&self, collection: &str, id: &str) -> StorageResult<Option<Document>> {
        Ok(Self::read_document(&self.document_path(collection, id))?
            .filter(|document| document_id(document) == Some(id)))
    }

    /// Load every document of a collection.
    fn load_collection(&self, collection: &str) -> StorageResult<Vec<Document>> {
        let dir = self.collection_dir(collection);

        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();

        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();

            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match Self::read_document(&path) {
                Ok(Some(document)) => documents.push(document),
                Ok(None) => {}
                Err(StorageError::Serialization(e)) => {
                    tracing::warn!(path = ?path, error = %e, "Failed to parse document file");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(documents)
    }

    /// Resolve each relation filter to the set of matching related ids.
    fn resolve_relations(&self, relations: &[RelationFilter]) -> StorageResult<RelationMatches> {
        let mut resolved = RelationMatches::new();
        for relation in relations {
            let related = self.load_collection(&relation.collection)?;
            resolved.insert(
                relation.relation.clone(),
                eval::matching_ids(&related, &relation.filters),
            );
        }
        Ok(resolved)
    }

    fn filtered(&self, collection: &str, filter: &Filter) -> StorageResult<Vec<Document>> {
        let relations = self.resolve_relations(&filter.relations)?;
        Ok(self
            .load_collection(collection)?
            .into_iter()
            .filter(|document| eval::matches(document, filter, &relations))
            .collect())
    }
}

#[async_trait]
impl DocumentStorage for FileDocumentStorage {
    async fn insert(&self, collection: &str, document: Document) -> StorageResult<Document> {
        let _guard = self.lock.lock().await;

        let id = document_id(&document)
            .ok_or_else(|| StorageError::Serialization("document has no _id".to_string()))?;
        let path = self.document_path(collection, id);

        if path.exists() {
            return Err(StorageError::Duplicate(format!("{collection}/{id}")));
        }

        Self::write_document(&path, &document)?;
        Ok(document)
    }

    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Document>> {
        self.read_by_id(collection, id)
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> StorageResult<Option<Document>> {
        let _guard = self.lock.lock().await;

        let Some(mut document) = self.read_by_id(collection, id)? else {
            return Ok(None);
        };

        document.extend(fields);
        Self::write_document(&self.document_path(collection, id), &document)?;
        Ok(Some(document))
    }

    async fn find(&self, query: &QuerySpec) -> StorageResult<Vec<Document>> {
        let mut documents = self.filtered(&query.collection, &query.filter)?;
        eval::sort_documents(&mut documents, &query.sort);

        let offset = usize::try_from(query.page.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.page.limit).unwrap_or(usize::MAX);

        Ok(documents
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|document| query.projection.apply(document))
            .collect())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> StorageResult<u64> {
        let matched = self.filtered(collection, filter)?.len();
        Ok(u64::try_from(matched).unwrap_or(u64::MAX))
    }

    async fn find_by_ids(&self, collection: &str, ids: &[String]) -> StorageResult<Vec<Document>> {
        let mut documents = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(document) = self.read_by_id(collection, id)? {
                documents.push(document);
            }
        }
        Ok(documents)
    }

    async fn search(
        &self,
        collection: &str,
        keyword: &str,
        fields: &[String],
        limit: u64,
    ) -> StorageResult<Vec<Document>> {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let mut documents: Vec<Document> = self
            .load_collection(collection)?
            .into_iter()
            .filter(|document| !is_deleted(document))
            .filter(|document| eval::contains_keyword(document, keyword, fields))
            .collect();

        let newest_first: Vec<SortKey> = SortKey::parse(DEFAULT_SORT).into_iter().collect();
        eval::sort_documents(&mut documents, &newest_first);
        documents.truncate(limit);
        Ok(documents)
    }
}
