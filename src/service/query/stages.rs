//! Pure stages of the list pipeline.
//!
//! Each stage takes the query by value and returns the refined query.

use crate::config::QueryConfig;
use crate::domain::document::DELETED_AT_FIELD;
use crate::domain::query::{ComparisonOp, Condition, DEFAULT_SORT, RangeOperand, Scalar};
use crate::domain::{
    CollectionSchema, FieldFilter, FieldPath, PageRequest, Projection, QuerySpec, SortKey,
};
use crate::error::{AppError, Result};

use super::params::{FilterParam, FilterTarget, ListParams};

/// Turn filter parameters into conditions.
///
/// Repeated equality keys on one field become a membership test, repeated
/// `ne` keys an exclusion list. Relations filtered on are registered for
/// population, and soft-deleted related entities never satisfy a relation
/// filter.
///
/// # Errors
///
/// Returns `InvalidParam` when a range operand is neither a number nor a date.
pub fn filter(mut spec: QuerySpec, params: &ListParams) -> Result<QuerySpec> {
    let mut fields: Vec<FieldFilter> = Vec::new();
    let mut related: Vec<(String, String, Vec<FieldFilter>)> = Vec::new();

    for param in &params.filters {
        let condition = condition(param)?;
        match &param.target {
            FilterTarget::Field(path) => merge(&mut fields, path, condition),
            FilterTarget::Relation {
                relation,
                collection,
                path,
            } => {
                let index = match related.iter().position(|(r, _, _)| r == relation) {
                    Some(index) => index,
                    None => {
                        related.push((relation.clone(), collection.clone(), Vec::new()));
                        related.len() - 1
                    }
                };
                merge(&mut related[index].2, path, condition);
            }
        }
    }

    for field in fields {
        spec.filter = spec.filter.and(field);
    }

    for (relation, collection, filters) in related {
        for field in filters {
            spec.filter = spec.filter.and_related(&relation, &collection, field);
        }
    }

    let relations: Vec<(String, String)> = spec
        .filter
        .relations
        .iter()
        .map(|r| (r.relation.clone(), r.collection.clone()))
        .collect();
    for (relation, collection) in relations {
        spec.filter = spec
            .filter
            .and_related(&relation, &collection, FieldFilter::is_null(DELETED_AT_FIELD));
        spec = spec.with_join(&relation, &collection);
    }

    Ok(spec)
}

fn condition(param: &FilterParam) -> Result<Condition> {
    let value = param.value.as_str();
    let Some(op) = param.op else {
        return Ok(Condition::Eq(Scalar::new(value)));
    };

    if let Some(range) = op.range() {
        let operand = RangeOperand::parse(value).ok_or_else(|| {
            AppError::InvalidParam(format!(
                "{} expects a number or a date, got '{value}'",
                param.key
            ))
        })?;
        return Ok(Condition::Range { op: range, operand });
    }

    Ok(match op {
        ComparisonOp::Ne => Condition::Ne(Scalar::new(value)),
        ComparisonOp::In => Condition::In(list(value)),
        _ => Condition::Nin(list(value)),
    })
}

fn list(value: &str) -> Vec<Scalar> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(Scalar::new)
        .collect()
}

/// Fold a new condition into the filters already collected for a path.
fn merge(filters: &mut Vec<FieldFilter>, path: &FieldPath, condition: Condition) {
    let Some(index) = filters
        .iter()
        .position(|f| &f.path == path && mergeable(&f.condition, &condition))
    else {
        filters.push(FieldFilter::new(path.clone(), condition));
        return;
    };

    let merged = match (&filters[index].condition, condition) {
        (Condition::Eq(a), Condition::Eq(b)) => Ok(Condition::In(vec![a.clone(), b])),
        (Condition::Eq(a), Condition::In(b)) => Ok(Condition::In([vec![a.clone()], b].concat())),
        (Condition::In(a), Condition::Eq(b)) => Ok(Condition::In([a.clone(), vec![b]].concat())),
        (Condition::In(a), Condition::In(b)) => Ok(Condition::In([a.clone(), b].concat())),
        (Condition::Ne(a), Condition::Ne(b)) => Ok(Condition::Nin(vec![a.clone(), b])),
        (Condition::Ne(a), Condition::Nin(b)) => Ok(Condition::Nin([vec![a.clone()], b].concat())),
        (Condition::Nin(a), Condition::Ne(b)) => Ok(Condition::Nin([a.clone(), vec![b]].concat())),
        (Condition::Nin(a), Condition::Nin(b)) => Ok(Condition::Nin([a.clone(), b].concat())),
        (_, other) => Err(other),
    };

    match merged {
        Ok(condition) => filters[index].condition = condition,
        Err(other) => filters.push(FieldFilter::new(path.clone(), other)),
    }
}

const fn mergeable(existing: &Condition, incoming: &Condition) -> bool {
    matches!(
        (existing, incoming),
        (Condition::Eq(_) | Condition::In(_), Condition::Eq(_) | Condition::In(_))
            | (Condition::Ne(_) | Condition::Nin(_), Condition::Ne(_) | Condition::Nin(_))
    )
}

/// Apply `sort=a,-b`, falling back to newest first.
///
/// Keys that address a field of a related entity are dropped.
#[must_use]
pub fn sort(mut spec: QuerySpec, params: &ListParams, schema: &CollectionSchema) -> QuerySpec {
    let mut keys: Vec<SortKey> = Vec::new();

    for raw in params.sort.iter().flat_map(|value| value.split(',')) {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let Some(key) = SortKey::parse(raw) else {
            tracing::debug!(key = raw, "Ignoring malformed sort key");
            continue;
        };
        if key.path.tail().is_some() && schema.relation_target(key.path.root()).is_some() {
            tracing::debug!(key = raw, "Ignoring sort on a related entity's field");
            continue;
        }
        if !keys.iter().any(|existing| existing.path == key.path) {
            keys.push(key);
        }
    }

    if keys.is_empty() {
        keys.extend(SortKey::parse(DEFAULT_SORT));
    }

    spec.sort = keys;
    spec
}

/// Apply `fields=a,b` and `fields[relation]=a,b`.
///
/// A relation selected with `fields[relation]` is registered for population
/// and kept in the primary selection.
#[must_use]
pub fn project(mut spec: QuerySpec, params: &ListParams) -> QuerySpec {
    let selected = paths(params.fields.iter().map(String::as_str));
    if !selected.is_empty() {
        spec.projection = Projection::Include(selected);
    }

    for (relation, collection, raw) in &params.relation_fields {
        spec = spec.with_join(relation, collection);

        let selected = paths(std::iter::once(raw.as_str()));
        if !selected.is_empty() {
            if let Some(join) = spec.joins.iter_mut().find(|join| &join.relation == relation) {
                join.projection = Projection::Include(selected);
            }
        }

        if let Projection::Include(paths) = &mut spec.projection {
            let path = FieldPath::field(relation);
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }

    spec
}

fn paths<'a>(lists: impl Iterator<Item = &'a str>) -> Vec<FieldPath> {
    let mut paths: Vec<FieldPath> = Vec::new();
    for raw in lists.flat_map(|list| list.split(',')) {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        match FieldPath::parse(raw) {
            Some(path) if !paths.contains(&path) => paths.push(path),
            Some(_) => {}
            None => tracing::debug!(field = raw, "Ignoring malformed field selection"),
        }
    }
    paths
}

/// Register the relations the collection always populates.
#[must_use]
pub fn join(mut spec: QuerySpec, schema: &CollectionSchema) -> QuerySpec {
    for relation in &schema.populate {
        if let Some(collection) = schema.relation_target(relation) {
            spec = spec.with_join(relation, collection);
        }
    }
    spec
}

/// Apply `page` and `limit`.
///
/// # Errors
///
/// Returns `InvalidParam` when either is not a positive integer or `limit`
/// exceeds the configured maximum.
pub fn paginate(mut spec: QuerySpec, params: &ListParams, config: &QueryConfig) -> Result<QuerySpec> {
    let page = positive("page", params.page.as_deref())?.unwrap_or(1);
    let limit = positive("limit", params.limit.as_deref())?.unwrap_or(config.default_limit);

    if limit > config.max_limit {
        return Err(AppError::InvalidParam(format!(
            "limit cannot exceed {}",
            config.max_limit
        )));
    }

    spec.page = PageRequest { page, limit };
    Ok(spec)
}

fn positive(name: &str, raw: Option<&str>) -> Result<Option<u64>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|value| *value > 0)
        .map(Some)
        .ok_or_else(|| {
            AppError::InvalidParam(format!("{name} must be a positive integer, got '{raw}'"))
        })
}
