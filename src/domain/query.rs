//! Typed query specification for collection listings.
//!
//! A `QuerySpec` is built once from the raw request parameters and then handed
//! to a storage backend. Filtering, ordering and pagination are executed by the
//! backend; projection and joins are described here and applied to fetched
//! documents.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::{Number, Value};

use super::document::{Document, ID_FIELD, VERSION_FIELD, parse_timestamp};

/// Parameter names that never become filters.
pub const RESERVED_PARAMS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// Default sort: newest first.
pub const DEFAULT_SORT: &str = "-createdAt";

/// Dot-separated path into a document, e.g. `address.city`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Parse a path. Segments must be non-empty and made of ASCII
    /// alphanumerics or `_`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        let valid = segments.iter().all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
        valid.then_some(Self(segments))
    }

    /// Single-segment path. The caller guarantees the name is valid.
    #[must_use]
    pub fn field(name: &str) -> Self {
        Self(vec![name.to_string()])
    }

    /// Path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// First segment.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.0[0]
    }

    /// Path without its first segment, if any remains.
    #[must_use]
    pub fn tail(&self) -> Option<Self> {
        (self.0.len() > 1).then(|| Self(self.0[1..].to_vec()))
    }

    /// Resolve the path against a document.
    #[must_use]
    pub fn lookup<'a>(&self, document: &'a Document) -> Option<&'a Value> {
        let (first, rest) = self.0.split_first()?;
        rest.iter()
            .try_fold(document.get(first)?, |value, segment| value.get(segment))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// Comparison operators accepted in `field[op]=value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Gt,
    Gte,
    Lt,
    Lte,
    Ne,
    In,
    Nin,
}

impl ComparisonOp {
    /// Parse an operator name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "ne" => Some(Self::Ne),
            "in" => Some(Self::In),
            "nin" => Some(Self::Nin),
            _ => None,
        }
    }

    /// Range part of the operator, if it is one.
    #[must_use]
    pub const fn range(self) -> Option<RangeOp> {
        match self {
            Self::Gt => Some(RangeOp::Gt),
            Self::Gte => Some(RangeOp::Gte),
            Self::Lt => Some(RangeOp::Lt),
            Self::Lte => Some(RangeOp::Lte),
            Self::Ne | Self::In | Self::Nin => None,
        }
    }
}

/// Ordering comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl RangeOp {
    /// Whether `stored <op> operand` holds given `stored.cmp(operand)`.
    #[must_use]
    pub const fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Gt => matches!(ordering, Ordering::Greater),
            Self::Gte => !matches!(ordering, Ordering::Less),
            Self::Lt => matches!(ordering, Ordering::Less),
            Self::Lte => !matches!(ordering, Ordering::Greater),
        }
    }

    /// SQL spelling.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

/// A raw query-string value, compared against stored JSON by stored type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar(String);

impl Scalar {
    /// Wrap raw text.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// JSON values this text is equal to: the string itself plus its number,
    /// boolean or null reading where one exists.
    #[must_use]
    pub fn candidates(&self) -> Vec<Value> {
        let raw = self.0.as_str();
        let mut values = vec![Value::String(raw.to_string())];
        if let Ok(int) = raw.parse::<i64>() {
            values.push(Value::from(int));
        } else if let Some(number) = raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
        {
            values.push(Value::Number(number));
        }
        match raw {
            "true" => values.push(Value::Bool(true)),
            "false" => values.push(Value::Bool(false)),
            "null" => values.push(Value::Null),
            _ => {}
        }
        values
    }
}

/// Operand of a range comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeOperand {
    /// Compared against stored numbers.
    Number(f64),
    /// Compared against stored RFC 3339 timestamps and `YYYY-MM-DD` dates.
    Timestamp(DateTime<Utc>),
}

impl RangeOperand {
    /// Parse a number, an RFC 3339 timestamp or a `YYYY-MM-DD` date.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(number) = raw.parse::<f64>() {
            return number.is_finite().then_some(Self::Number(number));
        }
        parse_timestamp(raw).map(Self::Timestamp)
    }
}

/// Condition applied to the value found at a field path.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the value (any element, for arrays).
    Eq(Scalar),
    /// Field differs from the value, or is missing.
    Ne(Scalar),
    /// Field equals one of the values.
    In(Vec<Scalar>),
    /// Field equals none of the values, or is missing.
    Nin(Vec<Scalar>),
    /// Ordered comparison on numbers or timestamps.
    Range { op: RangeOp, operand: RangeOperand },
    /// Field is null or missing.
    IsNull,
}

/// Condition on a single field of the primary collection.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    /// Path of the field.
    pub path: FieldPath,
    /// Condition to satisfy.
    pub condition: Condition,
}

impl FieldFilter {
    /// Build a filter.
    #[must_use]
    pub const fn new(path: FieldPath, condition: Condition) -> Self {
        Self { path, condition }
    }

    /// `field` is null or missing.
    #[must_use]
    pub fn is_null(field: &str) -> Self {
        Self::new(FieldPath::field(field), Condition::IsNull)
    }
}

/// Conditions evaluated against the entity a relation field points at.
///
/// A document matches when any referenced entity satisfies every filter.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationFilter {
    /// Relation field on the primary document.
    pub relation: String,
    /// Collection the relation resolves into.
    pub collection: String,
    /// Conditions on the related entity.
    pub filters: Vec<FieldFilter>,
}

/// Filter shared by the data fetch and the count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    /// Conditions on the primary document.
    pub fields: Vec<FieldFilter>,
    /// Join-then-filter conditions.
    pub relations: Vec<RelationFilter>,
}

impl Filter {
    /// Add a condition on the primary document.
    #[must_use]
    pub fn and(mut self, filter: FieldFilter) -> Self {
        self.fields.push(filter);
        self
    }

    /// Add a condition on a related entity.
    #[must_use]
    pub fn and_related(mut self, relation: &str, collection: &str, filter: FieldFilter) -> Self {
        if let Some(existing) = self
            .relations
            .iter_mut()
            .find(|existing| existing.relation == relation)
        {
            existing.filters.push(filter);
        } else {
            self.relations.push(RelationFilter {
                relation: relation.to_string(),
                collection: collection.to_string(),
                filters: vec![filter],
            });
        }
        self
    }

    /// Whether the filter has no conditions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.relations.is_empty()
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Field to order by.
    pub path: FieldPath,
    /// Direction.
    pub direction: SortDirection,
}

impl SortKey {
    /// Parse `field` or `-field`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (direction, name) = match raw.strip_prefix('-') {
            Some(name) => (SortDirection::Descending, name),
            None => (
                SortDirection::Ascending,
                raw.strip_prefix('+').unwrap_or(raw),
            ),
        };
        FieldPath::parse(name).map(|path| Self { path, direction })
    }
}

/// Field selection for returned documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Return everything except these top-level fields.
    Exclude(Vec<String>),
    /// Return only these paths plus `_id`.
    Include(Vec<FieldPath>),
}

impl Default for Projection {
    fn default() -> Self {
        Self::Exclude(vec![VERSION_FIELD.to_string()])
    }
}

impl Projection {
    /// Apply the selection to a document.
    #[must_use]
    pub fn apply(&self, mut document: Document) -> Document {
        match self {
            Self::Exclude(fields) => {
                for field in fields {
                    document.remove(field);
                }
                document
            }
            Self::Include(paths) => {
                let mut selected = Document::new();
                if let Some(id) = document.get(ID_FIELD) {
                    selected.insert(ID_FIELD.to_string(), id.clone());
                }
                for path in paths {
                    if let Some(value) = path.lookup(&document) {
                        insert_path(&mut selected, path.segments(), value.clone());
                    }
                }
                selected
            }
        }
    }
}

fn insert_path(target: &mut Document, segments: &[String], value: Value) {
    match segments {
        [] => {}
        [last] => {
            target.insert(last.clone(), value);
        }
        [first, rest @ ..] => {
            let entry = target
                .entry(first.clone())
                .or_insert_with(|| Value::Object(Document::new()));
            if let Value::Object(nested) = entry {
                insert_path(nested, rest, value);
            }
        }
    }
}

/// Relation to populate on fetched documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// Relation field on the primary document.
    pub relation: String,
    /// Collection the relation resolves into.
    pub collection: String,
    /// Fields returned for the related entity.
    pub projection: Projection,
}

/// Requested page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u64,
    /// Page size.
    pub limit: u64,
}

impl PageRequest {
    /// Number of records skipped before this page.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

/// Complete description of a listing query over one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    /// Collection queried.
    pub collection: String,
    /// Filter used by both the fetch and the count.
    pub filter: Filter,
    /// Ordering; empty means storage order.
    pub sort: Vec<SortKey>,
    /// Field selection on the primary documents.
    pub projection: Projection,
    /// Relations to populate.
    pub joins: Vec<Join>,
    /// Page to return.
    pub page: PageRequest,
}

impl QuerySpec {
    /// Unfiltered query over a collection.
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: Filter::default(),
            sort: Vec::new(),
            projection: Projection::default(),
            joins: Vec::new(),
            page: PageRequest::default(),
        }
    }

    /// Add a primary-document condition.
    #[must_use]
    pub fn with_filter(mut self, filter: FieldFilter) -> Self {
        self.filter = self.filter.and(filter);
        self
    }

    /// Register a relation for population with its default projection.
    /// An existing registration is kept unchanged.
    #[must_use]
    pub fn with_join(mut self, relation: &str, collection: &str) -> Self {
        if !self.joins.iter().any(|join| join.relation == relation) {
            self.joins.push(Join {
                relation: relation.to_string(),
                collection: collection.to_string(),
                projection: Projection::default(),
            });
        }
        self
    }
}
