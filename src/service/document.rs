//! Collection document service.
//!
//! Creation, lookup, listing, keyword search and soft deletion for every
//! registered collection.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::document::{
    CREATED_AT_FIELD, DELETED_AT_FIELD, ID_FIELD, SYSTEM_FIELDS, UPDATED_AT_FIELD, VERSION_FIELD,
    document_id, is_deleted, timestamp,
};
use crate::domain::{
    CollectionRegistry, CollectionSchema, Document, FieldFilter, Join, ListResponse, Projection,
    QuerySpec, SearchResponse,
};
use crate::error::{AppError, Result};
use crate::service::query::{QueryPipeline, populate};
use crate::service::sequence::SequenceService;
use crate::storage::traits::{DocumentStorage, Storage};

/// Shortest accepted search keyword, in characters.
const MIN_KEYWORD_LENGTH: usize = 2;

/// Service for collection documents.
pub struct DocumentService {
    /// Storage backend.
    storage: Arc<dyn Storage>,
    /// Registered collections.
    registry: CollectionRegistry,
    /// Sequential ID allocator.
    sequences: Arc<SequenceService>,
    /// List query pipeline.
    pipeline: QueryPipeline,
    /// Largest number of search results.
    search_limit: u64,
}

impl DocumentService {
    /// Create a new document service.
    pub fn new(
        storage: Arc<dyn Storage>,
        registry: CollectionRegistry,
        sequences: Arc<SequenceService>,
        config: &AppConfig,
    ) -> Self {
        Self {
            pipeline: QueryPipeline::new(Arc::clone(&storage), &config.query),
            search_limit: config.query.max_limit,
            storage,
            registry,
            sequences,
        }
    }

    /// Look up a registered collection.
    ///
    /// # Errors
    ///
    /// Returns `CollectionNotFound` for unknown names.
    pub fn schema(&self, collection: &str) -> Result<&CollectionSchema> {
        self.registry
            .get(collection)
            .ok_or_else(|| AppError::CollectionNotFound(collection.to_string()))
    }

    /// List live documents of a collection.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown collections, invalid parameters or
    /// storage failures.
    pub async fn list(
        &self,
        collection: &str,
        raw: &[(String, String)],
        base_url: &str,
    ) -> Result<ListResponse> {
        let schema = self.schema(collection)?;
        let base = QuerySpec::new(collection).with_filter(FieldFilter::is_null(DELETED_AT_FIELD));

        self.pipeline.apply_all(base, schema, raw, base_url).await
    }

    /// Fetch one live document with every relation populated.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the document is absent or soft-deleted.
    pub async fn get(&self, collection: &str, id: &str) -> Result<Document> {
        let schema = self.schema(collection)?;

        let document = self
            .storage
            .get(collection, id)
            .await?
            .filter(|document| !is_deleted(document))
            .ok_or_else(|| AppError::NotFound(format!("{collection}/{id}")))?;

        let joins: Vec<Join> = schema
            .relations
            .iter()
            .map(|(relation, target)| Join {
                relation: relation.clone(),
                collection: target.clone(),
                projection: Projection::default(),
            })
            .collect();

        let document = Projection::default().apply(document);
        let mut populated = populate::populate(self.storage.as_ref(), &joins, vec![document]).await?;
        populated
            .pop()
            .ok_or_else(|| AppError::Internal("population dropped the document".to_string()))
    }

    /// Case-insensitive keyword search over the collection's search fields.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` for keywords shorter than two characters.
    pub async fn search(&self, collection: &str, keyword: &str) -> Result<SearchResponse> {
        let schema = self.schema(collection)?;
        let keyword = keyword.trim();

        if keyword.chars().count() < MIN_KEYWORD_LENGTH {
            return Err(AppError::InvalidParam(format!(
                "q must be at least {MIN_KEYWORD_LENGTH} characters"
            )));
        }

        let items: Vec<Document> = self
            .storage
            .search(collection, keyword, &schema.search, self.search_limit)
            .await?
            .into_iter()
            .map(|document| Projection::default().apply(document))
            .collect();

        Ok(SearchResponse {
            results: items.len(),
            items,
        })
    }

    /// Create a document.
    ///
    /// Collections with a sequence preview the next ID, validate the body,
    /// and only then commit the counter. A failed insert after the commit
    /// leaves a gap in the sequence.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for a non-object body or malformed references,
    /// `MissingField` when a required field is absent, or a storage error.
    pub async fn create(&self, collection: &str, body: Value) -> Result<Document> {
        let schema = self.schema(collection)?;

        let Value::Object(mut document) = body else {
            return Err(AppError::BadRequest(
                "request body must be a JSON object".to_string(),
            ));
        };

        for field in SYSTEM_FIELDS {
            document.remove(field);
        }
        if let Some(sequence) = &schema.sequence {
            document.remove(&sequence.field);
        }

        let preview = match &schema.sequence {
            Some(sequence) => Some(
                self.sequences
                    .preview_next(&sequence.counter, &sequence.options())
                    .await?,
            ),
            None => None,
        };

        validate(schema, &document)?;

        if let Some(sequence) = &schema.sequence {
            let assigned = self
                .sequences
                .increment_and_format(&sequence.counter, &sequence.options())
                .await?;
            if preview.as_deref() != Some(assigned.as_str()) {
                tracing::debug!(
                    collection,
                    preview = ?preview,
                    assigned = %assigned,
                    "Sequence advanced between preview and commit"
                );
            }
            document.insert(sequence.field.clone(), Value::String(assigned));
        }

        let now = timestamp(Utc::now());
        document.insert(ID_FIELD.to_string(), Value::String(Uuid::new_v4().to_string()));
        document.insert(CREATED_AT_FIELD.to_string(), Value::String(now.clone()));
        document.insert(UPDATED_AT_FIELD.to_string(), Value::String(now));
        document.insert(VERSION_FIELD.to_string(), Value::from(0));

        let stored = self.storage.insert(collection, document).await?;
        tracing::info!(collection, id = document_id(&stored), "Document created");

        Ok(Projection::default().apply(stored))
    }

    /// Mark a document deleted. Sequence values are never reclaimed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the document is absent or already deleted.
    pub async fn soft_delete(&self, collection: &str, id: &str) -> Result<()> {
        self.schema(collection)?;

        let live = self
            .storage
            .get(collection, id)
            .await?
            .is_some_and(|document| !is_deleted(&document));
        if !live {
            return Err(AppError::NotFound(format!("{collection}/{id}")));
        }

        let now = Value::String(timestamp(Utc::now()));
        let mut fields = Document::new();
        fields.insert(DELETED_AT_FIELD.to_string(), now.clone());
        fields.insert(UPDATED_AT_FIELD.to_string(), now);

        self.storage
            .update_fields(collection, id, fields)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{collection}/{id}")))?;

        tracing::info!(collection, id, "Document soft-deleted");
        Ok(())
    }
}

/// Check required fields and the shape of relation fields.
fn validate(schema: &CollectionSchema, document: &Document) -> Result<()> {
    for field in &schema.required {
        let present = match document.get(field) {
            None | Some(Value::Null) => false,
            Some(Value::String(text)) => !text.trim().is_empty(),
            Some(_) => true,
        };
        if !present {
            return Err(AppError::MissingField(field.clone()));
        }
    }

    for relation in schema.relations.keys() {
        let valid = match document.get(relation) {
            None | Some(Value::Null | Value::String(_)) => true,
            Some(Value::Array(items)) => items.iter().all(Value::is_string),
            Some(_) => false,
        };
        if !valid {
            return Err(AppError::BadRequest(format!(
                "{relation} must be an id or a list of ids"
            )));
        }
    }

    Ok(())
}
