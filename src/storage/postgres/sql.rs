//! Compilation of listing filters and orderings into `PostgreSQL`.
//!
//! Documents live in a single `documents` table as JSONB. Field paths are bound
//! as `text[]` and addressed with `#>`, so user input never reaches the SQL text.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};

use crate::domain::query::{Condition, RangeOp, RangeOperand, Scalar};
use crate::domain::{FieldFilter, FieldPath, Filter, SortDirection, SortKey};

/// Alias of the primary `documents` row in compiled queries.
pub(super) const PRIMARY: &str = "d";

/// Alias of the related row inside relation subqueries.
const RELATED: &str = "r";

const DATE_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}$";

const TIMESTAMP_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})$";

/// Append ` AND <condition>` for every condition of the filter.
pub(super) fn push_filter(builder: &mut QueryBuilder<'static, Postgres>, filter: &Filter) {
    for field in &filter.fields {
        builder.push(" AND ");
        push_field_filter(builder, PRIMARY, field);
    }

    for relation in &filter.relations {
        builder.push(" AND EXISTS (SELECT 1 FROM documents ");
        builder.push(RELATED);
        builder.push(" WHERE ");
        builder.push(RELATED);
        builder.push(".collection = ");
        builder.push_bind(relation.collection.clone());
        builder.push(" AND (");
        builder.push(PRIMARY);
        builder.push(".body -> ");
        builder.push_bind(relation.relation.clone());
        builder.push(") @> to_jsonb(");
        builder.push(RELATED);
        builder.push(".id)");
        for field in &relation.filters {
            builder.push(" AND ");
            push_field_filter(builder, RELATED, field);
        }
        builder.push(")");
    }
}

/// Append ` ORDER BY ...`, always ending on the row id so pages are stable.
///
/// jsonb orders null < strings < numbers < booleans < arrays < objects, and
/// a missing field sorts last ascending and first descending.
pub(super) fn push_order(builder: &mut QueryBuilder<'static, Postgres>, sort: &[SortKey]) {
    builder.push(" ORDER BY ");
    for key in sort {
        push_path(builder, PRIMARY, &key.path);
        builder.push(match key.direction {
            SortDirection::Ascending => " ASC, ",
            SortDirection::Descending => " DESC, ",
        });
    }
    builder.push(PRIMARY);
    builder.push(".id ASC");
}

fn push_field_filter(builder: &mut QueryBuilder<'static, Postgres>, alias: &str, filter: &FieldFilter) {
    let path = &filter.path;
    match &filter.condition {
        Condition::Eq(scalar) => push_any_equal(builder, alias, path, std::slice::from_ref(scalar)),
        Condition::In(scalars) => push_any_equal(builder, alias, path, scalars),
        Condition::Ne(scalar) => {
            builder.push("NOT ");
            push_any_equal(builder, alias, path, std::slice::from_ref(scalar));
        }
        Condition::Nin(scalars) => {
            builder.push("NOT ");
            push_any_equal(builder, alias, path, scalars);
        }
        Condition::IsNull => push_is_null(builder, alias, path),
        Condition::Range {
            op,
            operand: RangeOperand::Number(bound),
        } => {
            builder.push("CASE WHEN jsonb_typeof(");
            push_path(builder, alias, path);
            builder.push(") = 'number' THEN (");
            push_path_text(builder, alias, path);
            builder.push(")::float8 ");
            builder.push(op.sql());
            builder.push(" ");
            builder.push_bind(*bound);
            builder.push(" ELSE false END");
        }
        Condition::Range {
            op,
            operand: RangeOperand::Timestamp(bound),
        } => push_timestamp_range(builder, alias, path, *op, *bound),
    }
}

/// Stored strings are compared as instants: dates as midnight UTC, RFC 3339
/// text with its own offset. Anything else does not match.
fn push_timestamp_range(
    builder: &mut QueryBuilder<'static, Postgres>,
    alias: &str,
    path: &FieldPath,
    op: RangeOp,
    bound: DateTime<Utc>,
) {
    builder.push("CASE WHEN jsonb_typeof(");
    push_path(builder, alias, path);
    builder.push(") IS DISTINCT FROM 'string' THEN false WHEN ");
    push_path_text(builder, alias, path);
    builder.push(" ~ '");
    builder.push(DATE_PATTERN);
    builder.push("' THEN (");
    push_path_text(builder, alias, path);
    builder.push(" || 'T00:00:00Z')::timestamptz ");
    builder.push(op.sql());
    builder.push(" ");
    builder.push_bind(bound);
    builder.push(" WHEN ");
    push_path_text(builder, alias, path);
    builder.push(" ~ '");
    builder.push(TIMESTAMP_PATTERN);
    builder.push("' THEN (");
    push_path_text(builder, alias, path);
    builder.push(")::timestamptz ");
    builder.push(op.sql());
    builder.push(" ");
    builder.push_bind(bound);
    builder.push(" ELSE false END");
}

/// `COALESCE(P @> c1 OR P @> c2 ..., false)`. Containment is equality for
/// scalars and membership for arrays.
fn push_any_equal(
    builder: &mut QueryBuilder<'static, Postgres>,
    alias: &str,
    path: &FieldPath,
    scalars: &[Scalar],
) {
    builder.push("COALESCE((");
    let candidates = scalars.iter().flat_map(Scalar::candidates);
    let mut first = true;
    for candidate in candidates {
        if !first {
            builder.push(" OR ");
        }
        first = false;

        if candidate.is_null() {
            push_is_null(builder, alias, path);
        } else {
            push_path(builder, alias, path);
            builder.push(" @> ");
            builder.push_bind(Json(candidate));
        }
    }
    if first {
        builder.push("false");
    }
    builder.push("), false)");
}

fn push_is_null(builder: &mut QueryBuilder<'static, Postgres>, alias: &str, path: &FieldPath) {
    builder.push("(");
    push_path(builder, alias, path);
    builder.push(" IS NULL OR ");
    push_path(builder, alias, path);
    builder.push(" = 'null'::jsonb)");
}

fn push_path(builder: &mut QueryBuilder<'static, Postgres>, alias: &str, path: &FieldPath) {
    builder.push("(");
    builder.push(alias);
    builder.push(".body #> ");
    builder.push_bind(path.segments().to_vec());
    builder.push(")");
}

fn push_path_text(builder: &mut QueryBuilder<'static, Postgres>, alias: &str, path: &FieldPath) {
    builder.push("(");
    builder.push(alias);
    builder.push(".body #>> ");
    builder.push_bind(path.segments().to_vec());
    builder.push(")");
}

/// Escape `LIKE` metacharacters and wrap the keyword for a substring match.
pub(super) fn like_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(filter: &Filter) -> String {
        let mut builder = QueryBuilder::new("SELECT d.body FROM documents d WHERE d.collection = ");
        builder.push_bind("scopes");
        push_filter(&mut builder, filter);
        builder.sql().to_string()
    }

    #[test]
    fn test_equality_uses_containment() {
        let filter = Filter::default().and(FieldFilter::new(
            FieldPath::field("progress"),
            Condition::Eq(Scalar::new("50")),
        ));
        let sql = compiled(&filter);
        assert!(sql.contains("COALESCE(((d.body #> $2) @> $3 OR (d.body #> $4) @> $5), false)"));
    }

    #[test]
    fn test_ne_negates() {
        let filter = Filter::default().and(FieldFilter::new(
            FieldPath::field("status"),
            Condition::Ne(Scalar::new("draft")),
        ));
        assert!(compiled(&filter).contains(" AND NOT COALESCE("));
    }

    #[test]
    fn test_numeric_range() {
        let filter = Filter::default().and(FieldFilter::new(
            FieldPath::field("progress"),
            Condition::Range {
                op: RangeOp::Gte,
                operand: RangeOperand::Number(50.0),
            },
        ));
        let sql = compiled(&filter);
        assert!(sql.contains("= 'number' THEN ((d.body #>> $3))::float8 >= $4 ELSE false END"));
    }

    #[test]
    fn test_timestamp_range_casts_to_timestamptz() {
        let filter = Filter::default().and(FieldFilter::new(
            FieldPath::field("dueDate"),
            Condition::Range {
                op: RangeOp::Lte,
                operand: RangeOperand::parse("2025-12-31").unwrap(),
            },
        ));
        let sql = compiled(&filter);
        assert!(sql.contains("|| 'T00:00:00Z')::timestamptz <= $5"));
        assert!(sql.contains("((d.body #>> $7))::timestamptz <= $8 ELSE false END"));
        assert!(!sql.contains("COLLATE"));
    }

    #[test]
    fn test_relation_filter_is_exists_subquery() {
        let filter = Filter::default().and_related(
            "client",
            "clients",
            FieldFilter::new(FieldPath::field("clientName"), Condition::Eq(Scalar::new("Acme"))),
        );
        let sql = compiled(&filter);
        assert!(sql.contains("EXISTS (SELECT 1 FROM documents r WHERE r.collection = $2"));
        assert!(sql.contains("(d.body -> $3) @> to_jsonb(r.id)"));
        assert!(sql.contains("(r.body #> $4) @> $5"));
    }

    #[test]
    fn test_order_ends_on_id() {
        let mut builder = QueryBuilder::new("SELECT d.body FROM documents d");
        push_order(&mut builder, &[SortKey::parse("-createdAt").unwrap()]);
        assert_eq!(
            builder.sql(),
            "SELECT d.body FROM documents d ORDER BY (d.body #> $1) DESC, d.id ASC"
        );
    }

    #[test]
    fn test_like_pattern_escapes() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("roof"), "%roof%");
    }
}
