//! Service layer module.
//!
//! Contains the sequential ID allocator, the collection query pipeline and
//! the document operations built on them.

pub mod document;
pub mod query;
pub mod sequence;

pub use document::DocumentService;
pub use query::QueryPipeline;
pub use sequence::SequenceService;
