//! Data Transfer Objects for API requests and responses.

use serde::{Deserialize, Serialize};

use super::document::Document;

/// Standard API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Response code (0 = success, non-zero = error).
    pub code: i32,

    /// Human-readable message.
    pub message: String,

    /// Response data (null on error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create a success response.
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Create a success response with no data.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data: None,
        }
    }
}

/// A formatted sequence ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceIdResponse {
    /// Counter name.
    pub name: String,
    /// Formatted ID.
    pub id: String,
}

/// Pagination metadata of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    /// Documents matching the filter.
    pub total: u64,
    /// Current page (1-based).
    pub page: u64,
    /// Page size.
    pub limit: u64,
    /// `ceil(total / limit)`.
    pub pages: u64,
    /// Link to the following page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    /// Link to the preceding page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
}

/// A page of documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    /// Documents on this page.
    pub items: Vec<Document>,
    /// Navigation metadata.
    pub pagination: PaginationMeta,
}

/// Keyword search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Number of matches returned.
    pub results: usize,
    /// Matching documents.
    pub items: Vec<Document>,
}

/// Keyword search query.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    /// Keyword, at least two characters.
    #[serde(default)]
    pub q: String,
}
