//! Domain models for Sitebook.
//!
//! This module contains the core domain types: counters and their formatting,
//! stored documents, collection schemas, the typed listing query and the API
//! contracts.

pub mod counter;
pub mod document;
pub mod dto;
pub mod query;
pub mod schema;

pub use counter::{Counter, SequenceFormat, SequenceOptions};
pub use document::Document;
pub use dto::{
    ApiResponse, ListResponse, PaginationMeta, SearchQuery, SearchResponse, SequenceIdResponse,
};
pub use query::{
    Condition, FieldFilter, FieldPath, Filter, Join, PageRequest, Projection, QuerySpec,
    RelationFilter, SortDirection, SortKey,
};
pub use schema::{CollectionRegistry, CollectionSchema, SequenceSpec};
