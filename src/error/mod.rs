//! Error handling module.
//!
//! This module provides unified error handling with proper HTTP status code mapping
//! and standardized API error responses.

pub mod codes;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

pub use codes::ErrorCode;

/// Application-level error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Invalid configuration or sequence options.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Counter cannot advance any further.
    #[error("Sequence exhausted for: {0}")]
    SequenceExhausted(String),

    /// Invalid request body.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// A required document field is missing.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A query parameter carries a value that cannot be used.
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    /// Document not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Collection is not registered.
    #[error("Unknown collection: {0}")]
    CollectionNotFound(String),

    /// Storage backend error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidConfig(_) => ErrorCode::INVALID_CONFIG,
            Self::SequenceExhausted(_) => ErrorCode::SEQUENCE_EXHAUSTED,
            Self::BadRequest(_) => ErrorCode::BAD_REQUEST,
            Self::MissingField(_) => ErrorCode::MISSING_PARAM,
            Self::InvalidParam(_) => ErrorCode::INVALID_PARAM,
            Self::NotFound(_) => ErrorCode::NOT_FOUND,
            Self::CollectionNotFound(_) => ErrorCode::COLLECTION_NOT_FOUND,
            Self::Storage(_) => ErrorCode::STORAGE_ERROR,
            Self::Internal(_) => ErrorCode::INTERNAL_ERROR,
        }
    }

    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::CollectionNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidConfig(_)
            | Self::BadRequest(_)
            | Self::MissingField(_)
            | Self::InvalidParam(_) => StatusCode::BAD_REQUEST,
            Self::SequenceExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code().as_i32();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(
                error_code = code,
                status = %status,
                message = %message,
                "Request failed"
            );
        } else {
            tracing::warn!(
                error_code = code,
                status = %status,
                message = %message,
                "Request rejected"
            );
        }

        let body = Json(json!({
            "code": code,
            "message": message,
            "data": null
        }));

        (status, body).into_response()
    }
}

/// Storage-specific error type.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Connection error.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("Query failed: {0}")]
    Query(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Lock acquisition failed.
    #[error("Failed to acquire lock: {0}")]
    LockFailed(String),

    /// File I/O error.
    #[error("File I/O error: {0}")]
    FileIO(String),

    /// Write conflicted with an existing record.
    #[error("Duplicate key: {0}")]
    Duplicate(String),

    /// Backend not available.
    #[error("Storage backend unavailable")]
    Unavailable,
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::FileIO(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Connection(err.to_string())
            }
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Self::Duplicate(db.message().to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Self::Serialization(err.to_string())
            }
            other => Self::Query(other.to_string()),
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias using `StorageError`.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
