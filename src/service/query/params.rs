//! Classification of raw list parameters.
//!
//! Keys use the bracket syntax `field[op]`, `relation[field]` and
//! `relation[field][op]`. Anything that cannot be classified against the
//! collection's schema is dropped and logged.

use crate::domain::query::{ComparisonOp, RESERVED_PARAMS};
use crate::domain::{CollectionSchema, FieldPath};

/// What a filter parameter addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterTarget {
    /// A field of the primary document.
    Field(FieldPath),
    /// A field of the entity a relation points at.
    Relation {
        /// Relation field on the primary document.
        relation: String,
        /// Collection the relation resolves into.
        collection: String,
        /// Field of the related entity.
        path: FieldPath,
    },
}

/// One filter parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterParam {
    /// Original key, used in error messages.
    pub key: String,
    /// Addressed field.
    pub target: FilterTarget,
    /// Operator; `None` means equality.
    pub op: Option<ComparisonOp>,
    /// Raw value.
    pub value: String,
}

/// Parameters of a list request, sorted into their roles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    /// Raw `page`.
    pub page: Option<String>,
    /// Raw `limit`.
    pub limit: Option<String>,
    /// Comma lists given as `sort`.
    pub sort: Vec<String>,
    /// Comma lists given as `fields`.
    pub fields: Vec<String>,
    /// `fields[relation]` values as (relation, collection, list).
    pub relation_fields: Vec<(String, String, String)>,
    /// Filters in request order.
    pub filters: Vec<FilterParam>,
}

impl ListParams {
    /// Classify raw query pairs against a schema.
    #[must_use]
    pub fn parse(raw: &[(String, String)], schema: &CollectionSchema) -> Self {
        let mut params = Self::default();

        for (key, value) in raw {
            let Some((base, brackets)) = split_key(key) else {
                tracing::debug!(key = %key, "Ignoring malformed query parameter");
                continue;
            };

            if RESERVED_PARAMS.contains(&base) {
                params.reserved(key, base, &brackets, value, schema);
                continue;
            }

            match classify_filter(base, &brackets, schema) {
                Some((target, op)) => params.filters.push(FilterParam {
                    key: key.clone(),
                    target,
                    op,
                    value: value.clone(),
                }),
                None => tracing::debug!(key = %key, "Ignoring unsupported query parameter"),
            }
        }

        params
    }

    fn reserved(
        &mut self,
        key: &str,
        base: &str,
        brackets: &[&str],
        value: &str,
        schema: &CollectionSchema,
    ) {
        match (base, brackets) {
            ("page", []) => self.page = Some(value.to_string()),
            ("limit", []) => self.limit = Some(value.to_string()),
            ("sort", []) => self.sort.push(value.to_string()),
            ("fields", []) => self.fields.push(value.to_string()),
            ("fields", [relation]) => match schema.relation_target(relation) {
                Some(collection) => self.relation_fields.push((
                    (*relation).to_string(),
                    collection.to_string(),
                    value.to_string(),
                )),
                None => {
                    tracing::debug!(key = %key, "Ignoring field selection on a non-relation");
                }
            },
            _ => tracing::debug!(key = %key, "Ignoring malformed reserved parameter"),
        }
    }
}

/// Split `a[b][c]` into `("a", ["b", "c"])`. Returns `None` for unbalanced
/// or empty brackets.
fn split_key(key: &str) -> Option<(&str, Vec<&str>)> {
    let (base, mut rest) = match key.find('[') {
        Some(index) => (&key[..index], &key[index..]),
        None => (key, ""),
    };
    if base.is_empty() || base.contains(']') {
        return None;
    }

    let mut brackets = Vec::new();
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        let segment = &inner[..close];
        if segment.is_empty() || segment.contains('[') {
            return None;
        }
        brackets.push(segment);
        rest = &inner[close + 1..];
    }

    Some((base, brackets))
}

fn classify_filter(
    base: &str,
    brackets: &[&str],
    schema: &CollectionSchema,
) -> Option<(FilterTarget, Option<ComparisonOp>)> {
    let path = FieldPath::parse(base)?;

    match brackets {
        [] => Some((target_for(path, schema), None)),
        [segment] => {
            if let Some(op) = ComparisonOp::parse(segment) {
                return Some((target_for(path, schema), Some(op)));
            }
            let collection = relation_of(&path, schema)?;
            Some((
                FilterTarget::Relation {
                    relation: base.to_string(),
                    collection: collection.to_string(),
                    path: FieldPath::parse(segment)?,
                },
                None,
            ))
        }
        [segment, op] => {
            let collection = relation_of(&path, schema)?;
            Some((
                FilterTarget::Relation {
                    relation: base.to_string(),
                    collection: collection.to_string(),
                    path: FieldPath::parse(segment)?,
                },
                Some(ComparisonOp::parse(op)?),
            ))
        }
        _ => None,
    }
}

/// `relation.field` addresses the related entity; anything else is a field.
fn target_for(path: FieldPath, schema: &CollectionSchema) -> FilterTarget {
    if let (Some(collection), Some(tail)) = (schema.relation_target(path.root()), path.tail()) {
        return FilterTarget::Relation {
            relation: path.root().to_string(),
            collection: collection.to_string(),
            path: tail,
        };
    }
    FilterTarget::Field(path)
}

fn relation_of<'a>(path: &FieldPath, schema: &'a CollectionSchema) -> Option<&'a str> {
    if path.segments().len() != 1 {
        return None;
    }
    schema.relation_target(path.root())
}
