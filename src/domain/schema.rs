//! Collection schemas.
//!
//! A schema tells the query pipeline which fields are relations (and where they
//! resolve), which relations are populated by default, and which counter, if
//! any, assigns the collection's human-readable ID.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::counter::SequenceOptions;

/// Sequence assigned to new documents of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceSpec {
    /// Counter name, e.g. `Scope`.
    pub counter: String,
    /// Document field receiving the formatted ID.
    pub field: String,
    /// Prefix, e.g. `SCP`.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Padding width.
    #[serde(default)]
    pub length: Option<i64>,
}

impl SequenceSpec {
    /// Formatting options for the allocator.
    #[must_use]
    pub fn options(&self) -> SequenceOptions {
        SequenceOptions {
            prefix: self.prefix.clone(),
            length: self.length,
        }
    }
}

/// Schema of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Collection name as used in URLs.
    pub name: String,

    /// Relation field -> target collection.
    #[serde(default)]
    pub relations: BTreeMap<String, String>,

    /// Relations populated on every listing.
    #[serde(default)]
    pub populate: Vec<String>,

    /// Fields a new document must carry.
    #[serde(default)]
    pub required: Vec<String>,

    /// Fields matched by keyword search.
    #[serde(default)]
    pub search: Vec<String>,

    /// Human-readable ID assignment.
    #[serde(default)]
    pub sequence: Option<SequenceSpec>,
}

impl CollectionSchema {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            relations: BTreeMap::new(),
            populate: Vec::new(),
            required: Vec::new(),
            search: Vec::new(),
            sequence: None,
        }
    }

    fn relation(mut self, field: &str, collection: &str) -> Self {
        self.relations
            .insert(field.to_string(), collection.to_string());
        self
    }

    fn populate(mut self, fields: &[&str]) -> Self {
        self.populate = fields.iter().map(|f| (*f).to_string()).collect();
        self
    }

    fn required(mut self, fields: &[&str]) -> Self {
        self.required = fields.iter().map(|f| (*f).to_string()).collect();
        self
    }

    fn search(mut self, fields: &[&str]) -> Self {
        self.search = fields.iter().map(|f| (*f).to_string()).collect();
        self
    }

    fn sequence(mut self, counter: &str, field: &str, prefix: &str, length: i64) -> Self {
        self.sequence = Some(SequenceSpec {
            counter: counter.to_string(),
            field: field.to_string(),
            prefix: Some(prefix.to_string()),
            length: Some(length),
        });
        self
    }

    /// Target collection of a relation field.
    #[must_use]
    pub fn relation_target(&self, field: &str) -> Option<&str> {
        self.relations.get(field).map(String::as_str)
    }
}

/// Built-in schemas for the construction domain.
#[must_use]
pub fn default_collections() -> Vec<CollectionSchema> {
    vec![
        CollectionSchema::named("users")
            .required(&["fullName", "email"])
            .search(&["fullName", "email"])
            .sequence("User", "userId", "USR", 4),
        CollectionSchema::named("clients")
            .relation("addedBy", "users")
            .required(&["clientName"])
            .search(&["clientName", "clientBusinessName"]),
        CollectionSchema::named("scopes")
            .relation("client", "clients")
            .relation("addedBy", "users")
            .populate(&["client"])
            .required(&["client", "natureOfWork"])
            .search(&["scopeTitle", "natureOfWork"])
            .sequence("Scope", "scopeId", "SCP", 4),
        CollectionSchema::named("quotations")
            .relation("projectId", "projects")
            .relation("createdBy", "users")
            .required(&["projectId"])
            .search(&["employeeSkillset"])
            .sequence("Quotation", "quotationId", "QUO", 4),
        CollectionSchema::named("projects")
            .relation("client", "clients")
            .relation("scope", "scopes")
            .relation("quotation", "quotations")
            .relation("siteVisits", "site_visits")
            .relation("createdBy", "users")
            .populate(&["client"])
            .required(&["title", "client"])
            .search(&["title"])
            .sequence("Project", "projectId", "PRJ", 4),
        CollectionSchema::named("tasks")
            .relation("project", "projects")
            .relation("assignees", "users")
            .relation("dependencies", "tasks")
            .relation("addedBy", "users")
            .populate(&["project", "assignees"])
            .required(&["project", "title", "startDate", "dueDate"])
            .search(&["title", "description"])
            .sequence("Task", "taskId", "TSK", 5),
        CollectionSchema::named("site_visits")
            .relation("projectId", "projects")
            .relation("clientRepresentative", "users")
            .relation("acceptedBy", "users")
            .relation("addedBy", "users")
            .populate(&["projectId"])
            .required(&["projectId", "siteVisitDate"])
            .search(&["contactMethod", "status"]),
        CollectionSchema::named("toolbox_meetings")
            .relation("project", "projects")
            .relation("addedBy", "users")
            .populate(&["project"])
            .required(&["project", "topicDiscussed", "date"])
            .search(&["projectName", "jobNumber", "topicDiscussed"]),
    ]
}

/// Registered collections, validated for internal consistency.
#[derive(Debug, Clone)]
pub struct CollectionRegistry {
    schemas: HashMap<String, CollectionSchema>,
}

impl CollectionRegistry {
    /// Build a registry.
    ///
    /// # Errors
    ///
    /// Returns a message when names repeat, a relation targets an unknown
    /// collection, or a populated field is not a relation.
    pub fn new(schemas: Vec<CollectionSchema>) -> Result<Self, String> {
        let mut by_name = HashMap::with_capacity(schemas.len());
        for schema in schemas {
            if schema.name.is_empty() {
                return Err("collection name cannot be empty".to_string());
            }
            if by_name.contains_key(&schema.name) {
                return Err(format!("collection '{}' is defined twice", schema.name));
            }
            by_name.insert(schema.name.clone(), schema);
        }

        for schema in by_name.values() {
            for (field, target) in &schema.relations {
                if !by_name.contains_key(target) {
                    return Err(format!(
                        "relation '{}.{field}' targets unknown collection '{target}'",
                        schema.name
                    ));
                }
            }
            for field in &schema.populate {
                if !schema.relations.contains_key(field) {
                    return Err(format!(
                        "collection '{}' populates '{field}', which is not a relation",
                        schema.name
                    ));
                }
            }
            if let Some(sequence) = &schema.sequence {
                if sequence.counter.is_empty() || sequence.field.is_empty() {
                    return Err(format!(
                        "collection '{}' has an incomplete sequence",
                        schema.name
                    ));
                }
            }
        }

        Ok(Self { schemas: by_name })
    }

    /// Look up a collection.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CollectionSchema> {
        self.schemas.get(name)
    }

    /// Registered collection names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
