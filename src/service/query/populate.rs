//! Population of relation fields with the documents they reference.

use std::collections::HashMap;

use serde_json::Value;

use crate::domain::document::{document_id, is_deleted, reference_ids};
use crate::domain::{Document, Join};
use crate::error::StorageResult;
use crate::storage::traits::{DocumentStorage, Storage};

/// Replace reference ids with the referenced documents.
///
/// A single reference that cannot be resolved (missing or soft-deleted)
/// becomes `null`; unresolvable ids inside an array are dropped.
///
/// # Errors
///
/// Returns an error if a related collection cannot be read.
pub async fn populate(
    storage: &dyn Storage,
    joins: &[Join],
    mut documents: Vec<Document>,
) -> StorageResult<Vec<Document>> {
    for join in joins {
        let mut ids: Vec<String> = documents
            .iter()
            .filter_map(|document| document.get(&join.relation))
            .flat_map(reference_ids)
            .map(str::to_string)
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let related: HashMap<String, Document> = if ids.is_empty() {
            HashMap::new()
        } else {
            storage
                .find_by_ids(&join.collection, &ids)
                .await?
                .into_iter()
                .filter(|document| !is_deleted(document))
                .filter_map(|document| {
                    let id = document_id(&document)?.to_string();
                    Some((id, join.projection.apply(document)))
                })
                .collect()
        };

        for document in &mut documents {
            if let Some(value) = document.get_mut(&join.relation) {
                resolve(value, &related);
            }
        }
    }

    Ok(documents)
}

fn resolve(value: &mut Value, related: &HashMap<String, Document>) {
    let resolved = match value {
        Value::String(id) => related
            .get(id.as_str())
            .cloned()
            .map_or(Value::Null, Value::Object),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(id) => related.get(id.as_str()).cloned().map(Value::Object),
                    other => Some(other.clone()),
                })
                .collect(),
        ),
        _ => return,
    };
    *value = resolved;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::FileStorageConfig;
    use crate::domain::{FieldPath, Projection};
    use crate::storage::file::FileStorage;
    use serde_json::json;
    use tempfile::TempDir;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    async fn storage() -> (Arc<dyn Storage>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(&FileStorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
        })
        .unwrap();
        for user in [
            json!({"_id": "u1", "fullName": "Ana", "email": "ana@example.com", "__v": 0}),
            json!({"_id": "u2", "fullName": "Bo", "deletedAt": "2025-01-01T00:00:00.000Z"}),
        ] {
            storage.insert("users", doc(user)).await.unwrap();
        }
        (Arc::new(storage), temp_dir)
    }

    #[tokio::test]
    async fn test_populates_single_and_array_references() {
        let (storage, _temp) = storage().await;
        let joins = vec![
            Join {
                relation: "addedBy".to_string(),
                collection: "users".to_string(),
                projection: Projection::Include(vec![FieldPath::field("fullName")]),
            },
            Join {
                relation: "assignees".to_string(),
                collection: "users".to_string(),
                projection: Projection::default(),
            },
        ];
        let tasks = vec![doc(json!({
            "_id": "t1",
            "addedBy": "u1",
            "assignees": ["u1", "u2", "missing"]
        }))];

        let populated = populate(storage.as_ref(), &joins, tasks).await.unwrap();

        assert_eq!(
            populated[0].get("addedBy"),
            Some(&json!({"_id": "u1", "fullName": "Ana"}))
        );
        assert_eq!(
            populated[0].get("assignees"),
            Some(&json!([{"_id": "u1", "fullName": "Ana", "email": "ana@example.com"}]))
        );
    }

    #[tokio::test]
    async fn test_orphaned_reference_becomes_null() {
        let (storage, _temp) = storage().await;
        let joins = vec![Join {
            relation: "addedBy".to_string(),
            collection: "users".to_string(),
            projection: Projection::default(),
        }];
        let tasks = vec![
            doc(json!({"_id": "t1", "addedBy": "u2"})),
            doc(json!({"_id": "t2"})),
        ];

        let populated = populate(storage.as_ref(), &joins, tasks).await.unwrap();

        assert_eq!(populated[0].get("addedBy"), Some(&Value::Null));
        assert!(!populated[1].contains_key("addedBy"));
    }
}
