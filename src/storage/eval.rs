//! In-process evaluation of listing queries.
//!
//! Used by backends that hold documents as JSON values rather than pushing the
//! query into a database engine. Semantics mirror the SQL compiled by the
//! PostgreSQL backend: values compare by stored type, arrays match when any
//! element matches, and a missing field sorts after every value.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::domain::document::{document_id, parse_timestamp, reference_ids};
use crate::domain::query::{Condition, RangeOp, RangeOperand, Scalar};
use crate::domain::{Document, FieldFilter, Filter, SortDirection, SortKey};

/// Ids of related entities satisfying each relation filter, keyed by relation.
pub type RelationMatches = HashMap<String, HashSet<String>>;

/// Whether a document satisfies every field filter.
#[must_use]
pub fn matches_fields(document: &Document, filters: &[FieldFilter]) -> bool {
    filters
        .iter()
        .all(|filter| condition_holds(filter.path.lookup(document), &filter.condition))
}

/// Whether a document satisfies a complete filter, given the pre-resolved
/// relation matches.
#[must_use]
pub fn matches(document: &Document, filter: &Filter, relations: &RelationMatches) -> bool {
    matches_fields(document, &filter.fields)
        && filter.relations.iter().all(|relation| {
            let Some(allowed) = relations.get(&relation.relation) else {
                return false;
            };
            document
                .get(&relation.relation)
                .is_some_and(|value| reference_ids(value).iter().any(|id| allowed.contains(*id)))
        })
}

/// Ids of the documents in `related` that satisfy `filters`.
#[must_use]
pub fn matching_ids(related: &[Document], filters: &[FieldFilter]) -> HashSet<String> {
    related
        .iter()
        .filter(|document| matches_fields(document, filters))
        .filter_map(|document| document_id(document).map(str::to_string))
        .collect()
}

/// Evaluate a condition against the value found at a path.
#[must_use]
pub fn condition_holds(stored: Option<&Value>, condition: &Condition) -> bool {
    match condition {
        Condition::Eq(scalar) => scalar_matches(stored, scalar),
        Condition::Ne(scalar) => !scalar_matches(stored, scalar),
        Condition::In(scalars) => scalars.iter().any(|scalar| scalar_matches(stored, scalar)),
        Condition::Nin(scalars) => !scalars.iter().any(|scalar| scalar_matches(stored, scalar)),
        Condition::IsNull => is_null(stored),
        Condition::Range { op, operand } => {
            stored.is_some_and(|value| range_holds(value, *op, operand))
        }
    }
}

fn is_null(stored: Option<&Value>) -> bool {
    stored.is_none_or(Value::is_null)
}

fn scalar_matches(stored: Option<&Value>, scalar: &Scalar) -> bool {
    scalar
        .candidates()
        .iter()
        .any(|candidate| candidate_matches(stored, candidate))
}

fn candidate_matches(stored: Option<&Value>, candidate: &Value) -> bool {
    match (stored, candidate) {
        (stored, Value::Null) => is_null(stored),
        (None, _) => false,
        (Some(Value::Array(items)), candidate) => {
            items.iter().any(|item| json_equal(item, candidate))
        }
        (Some(value), candidate) => json_equal(value, candidate),
    }
}

fn json_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn range_holds(value: &Value, op: RangeOp, operand: &RangeOperand) -> bool {
    let ordering = match operand {
        RangeOperand::Number(bound) => value.as_f64().and_then(|n| n.partial_cmp(bound)),
        RangeOperand::Timestamp(bound) => value
            .as_str()
            .and_then(parse_timestamp)
            .map(|at| at.cmp(bound)),
    };
    ordering.is_some_and(|ordering| op.holds(ordering))
}

/// Sort documents in place. Ties fall back to `_id` so pages are stable.
pub fn sort_documents(documents: &mut [Document], keys: &[SortKey]) {
    documents.sort_by(|a, b| {
        keys.iter()
            .map(|key| {
                let ordering = compare_values(key.path.lookup(a), key.path.lookup(b));
                match key.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| document_id(a).cmp(&document_id(b)))
    });
}

/// Total order over optional JSON values.
///
/// null < strings < numbers < booleans < arrays < objects < missing. Arrays
/// and objects compare by length first, as jsonb does.
#[must_use]
pub fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let rank = type_rank(a).cmp(&type_rank(b));
            if rank.is_ne() {
                return rank;
            }
            match (a, b) {
                (Value::String(x), Value::String(y)) => x.cmp(y),
                (Value::Number(x), Value::Number(y)) => x
                    .as_f64()
                    .partial_cmp(&y.as_f64())
                    .unwrap_or(Ordering::Equal),
                (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
                (Value::Array(x), Value::Array(y)) => x.len().cmp(&y.len()).then_with(|| {
                    x.iter()
                        .zip(y)
                        .map(|(l, r)| compare_values(Some(l), Some(r)))
                        .find(|ordering| ordering.is_ne())
                        .unwrap_or(Ordering::Equal)
                }),
                (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
                _ => Ordering::Equal,
            }
        }
    }
}

const fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Case-insensitive substring match over any of `fields`.
#[must_use]
pub fn contains_keyword(document: &Document, keyword: &str, fields: &[String]) -> bool {
    let needle = keyword.to_lowercase();
    fields.iter().any(|field| {
        document
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|text| text.to_lowercase().contains(&needle))
    })
}
