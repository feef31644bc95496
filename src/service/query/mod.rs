//! Collection query pipeline.
//!
//! Raw list parameters are classified once, refined through the pure stages
//! (filter, sort, projection, join, pagination), executed as a concurrent
//! fetch and count, populated, and wrapped with pagination metadata.

pub mod links;
pub mod params;
pub mod populate;
pub mod stages;

use std::sync::Arc;
use std::time::Instant;

use crate::config::QueryConfig;
use crate::domain::{CollectionSchema, ListResponse, QuerySpec};
use crate::error::Result;
use crate::storage::traits::{DocumentStorage, Storage};

pub use params::ListParams;

/// Executes list queries against a storage backend.
pub struct QueryPipeline {
    /// Storage backend.
    storage: Arc<dyn Storage>,
    /// Page size limits.
    config: QueryConfig,
}

impl QueryPipeline {
    /// Create a new pipeline.
    pub fn new(storage: Arc<dyn Storage>, config: &QueryConfig) -> Self {
        Self {
            storage,
            config: *config,
        }
    }

    /// Refine a base query with the request parameters.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` for unusable range operands or page parameters.
    pub fn plan(
        &self,
        base: QuerySpec,
        schema: &CollectionSchema,
        raw: &[(String, String)],
    ) -> Result<QuerySpec> {
        let params = ListParams::parse(raw, schema);

        let spec = stages::filter(base, &params)?;
        let spec = stages::sort(spec, &params, schema);
        let spec = stages::project(spec, &params);
        let spec = stages::join(spec, schema);
        stages::paginate(spec, &params, &self.config)
    }

    /// Run a list request end to end.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid parameters or storage failures.
    pub async fn apply_all(
        &self,
        base: QuerySpec,
        schema: &CollectionSchema,
        raw: &[(String, String)],
        base_url: &str,
    ) -> Result<ListResponse> {
        let spec = self.plan(base, schema, raw)?;
        let started = Instant::now();

        let (documents, total) = tokio::try_join!(
            self.storage.find(&spec),
            self.storage.count(&spec.collection, &spec.filter),
        )?;
        let items = populate::populate(self.storage.as_ref(), &spec.joins, documents).await?;

        let collection = spec.collection.clone();
        metrics::counter!("sitebook_list_queries_total", "collection" => collection.clone())
            .increment(1);
        metrics::histogram!("sitebook_list_query_seconds", "collection" => collection)
            .record(started.elapsed().as_secs_f64());

        tracing::debug!(
            collection = %spec.collection,
            total,
            returned = items.len(),
            page = spec.page.page,
            "List query served"
        );

        Ok(ListResponse {
            items,
            pagination: links::pagination(total, spec.page, base_url, raw),
        })
    }
}
