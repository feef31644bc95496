//! Stored document representation.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// A JSON document stored in a collection.
pub type Document = Map<String, Value>;

/// Identity field of every document.
pub const ID_FIELD: &str = "_id";

/// Creation timestamp field.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Last update timestamp field.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Soft-delete marker; `null` or absent means live.
pub const DELETED_AT_FIELD: &str = "deletedAt";

/// Internal schema-version marker hidden from default projections.
pub const VERSION_FIELD: &str = "__v";

/// Fields owned by the server; client-supplied values are discarded.
pub const SYSTEM_FIELDS: [&str; 5] = [
    ID_FIELD,
    CREATED_AT_FIELD,
    UPDATED_AT_FIELD,
    DELETED_AT_FIELD,
    VERSION_FIELD,
];

/// Identity of a document, if present.
#[must_use]
pub fn document_id(document: &Document) -> Option<&str> {
    document.get(ID_FIELD).and_then(Value::as_str)
}

/// Whether the document carries a non-null `deletedAt`.
#[must_use]
pub fn is_deleted(document: &Document) -> bool {
    document
        .get(DELETED_AT_FIELD)
        .is_some_and(|value| !value.is_null())
}

/// Canonical timestamp text stored in documents.
///
/// Fixed-width UTC with millisecond precision so text ordering equals time ordering.
#[must_use]
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse stored or supplied time text: RFC 3339, or a `YYYY-MM-DD` date taken
/// as midnight UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
}

/// Reference ids held by a relation field: a single id or an array of ids.
#[must_use]
pub fn reference_ids(value: &Value) -> Vec<&str> {
    match value {
        Value::String(id) => vec![id.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}
