use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

use crate::storage::errors::StorageError;
use crate::storage::types::{
    Document, DocumentStore, Durability, FieldFilter, WriteAck, validate_name,
};

#[derive(Default)]
struct Collections {
    documents: HashMap<String, Vec<Document>>,
    unique_fields: HashMap<String, HashSet<String>>,
}

/// Process-local document store, mostly useful for tests and demos
pub struct InMemoryDocumentStore {
    inner: Mutex<Collections>,
    acknowledge_writes: bool,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory document store");
        Self {
            inner: Mutex::new(Collections::default()),
            acknowledge_writes: true,
        }
    }

    /// A store that applies writes but reports every one of them as unacknowledged
    pub fn unacknowledged() -> Self {
        Self {
            acknowledge_writes: false,
            ..Self::new()
        }
    }

    fn ack(&self, matched: u64) -> WriteAck {
        WriteAck {
            acknowledged: self.acknowledge_writes,
            matched,
        }
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<(), StorageError> {
        validate_name(collection)?;
        validate_name(field)?;

        let mut inner = self.inner.lock().await;

        // Like index creation, refuse when stored documents already collide
        if let Some(docs) = inner.documents.get(collection) {
            let mut seen = HashSet::new();
            let collides = docs
                .iter()
                .filter_map(|doc| doc.get(field))
                .any(|value| !seen.insert(value.to_string()));
            if collides {
                return Err(StorageError::DuplicateKey {
                    collection: collection.to_string(),
                    field: field.to_string(),
                });
            }
        }

        inner
            .unique_fields
            .entry(collection.to_string())
            .or_default()
            .insert(field.to_string());
        Ok(())
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &FieldFilter,
    ) -> Result<Option<Document>, StorageError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .documents
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| filter.matches(doc)))
            .cloned())
    }

    async fn insert_one(
        &self,
        collection: &str,
        doc: Document,
        _durability: Durability,
    ) -> Result<WriteAck, StorageError> {
        let mut inner = self.inner.lock().await;

        if let Some(fields) = inner.unique_fields.get(collection) {
            let existing = inner.documents.get(collection);
            for field in fields {
                let Some(value) = doc.get(field) else {
                    continue;
                };
                let taken = existing
                    .is_some_and(|docs| docs.iter().any(|other| other.get(field) == Some(value)));
                if taken {
                    return Err(StorageError::DuplicateKey {
                        collection: collection.to_string(),
                        field: field.clone(),
                    });
                }
            }
        }

        inner
            .documents
            .entry(collection.to_string())
            .or_default()
            .push(doc);
        Ok(self.ack(1))
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &FieldFilter,
        set: Document,
        _durability: Durability,
    ) -> Result<WriteAck, StorageError> {
        let mut inner = self.inner.lock().await;

        let target = inner
            .documents
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|doc| filter.matches(doc)));

        match target {
            Some(doc) => {
                for (field, value) in set {
                    doc.insert(field, value);
                }
                Ok(self.ack(1))
            }
            None => Ok(self.ack(0)),
        }
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: &FieldFilter,
        _durability: Durability,
    ) -> Result<WriteAck, StorageError> {
        let mut inner = self.inner.lock().await;

        let Some(docs) = inner.documents.get_mut(collection) else {
            return Ok(self.ack(0));
        };

        match docs.iter().position(|doc| filter.matches(doc)) {
            Some(index) => {
                docs.remove(index);
                Ok(self.ack(1))
            }
            None => Ok(self.ack(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().expect("Expected a JSON object")
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        // Given an in-memory store with one document
        let store = InMemoryDocumentStore::new();
        store
            .insert_one(
                "users",
                doc(json!({"email": "a@b.com", "name": "A"})),
                Durability::Majority,
            )
            .await
            .expect("Insert should succeed");

        // When looking it up by email
        let found = store
            .find_one("users", &FieldFilter::eq("email", "a@b.com"))
            .await
            .expect("Find should succeed");

        // Then the stored document is returned
        assert_eq!(found, Some(doc(json!({"email": "a@b.com", "name": "A"}))));

        // And other collections are unaffected
        let other = store
            .find_one("sessions", &FieldFilter::eq("email", "a@b.com"))
            .await
            .expect("Find should succeed");
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_unique_field_rejects_second_insert() {
        let store = InMemoryDocumentStore::new();
        store
            .ensure_unique("users", "email")
            .await
            .expect("ensure_unique should succeed");

        store
            .insert_one("users", doc(json!({"email": "a@b.com"})), Durability::Default)
            .await
            .expect("First insert should succeed");

        let result = store
            .insert_one("users", doc(json!({"email": "a@b.com"})), Durability::Default)
            .await;

        assert_eq!(
            result,
            Err(StorageError::DuplicateKey {
                collection: "users".to_string(),
                field: "email".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_update_sets_fields_on_first_match_only() {
        let store = InMemoryDocumentStore::new();
        for name in ["first", "second"] {
            store
                .insert_one(
                    "users",
                    doc(json!({"email": "dup@b.com", "name": name})),
                    Durability::Default,
                )
                .await
                .expect("Insert should succeed");
        }

        let ack = store
            .update_one(
                "users",
                &FieldFilter::eq("email", "dup@b.com"),
                doc(json!({"name": "renamed", "preferences": {"a": 1}})),
                Durability::Default,
            )
            .await
            .expect("Update should succeed");

        assert_eq!(ack, WriteAck::acknowledged(1));

        let inner = store.inner.lock().await;
        let docs = &inner.documents["users"];
        assert_eq!(docs[0]["name"], json!("renamed"));
        assert_eq!(docs[0]["preferences"], json!({"a": 1}));
        assert_eq!(docs[1]["name"], json!("second"));
    }

    #[tokio::test]
    async fn test_update_without_match_does_not_insert() {
        let store = InMemoryDocumentStore::new();

        let ack = store
            .update_one(
                "sessions",
                &FieldFilter::eq("user_id", "nobody"),
                doc(json!({"jwt": "token"})),
                Durability::Default,
            )
            .await
            .expect("Update should succeed");

        assert_eq!(ack, WriteAck::acknowledged(0));
        let found = store
            .find_one("sessions", &FieldFilter::eq("user_id", "nobody"))
            .await
            .expect("Find should succeed");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_delete_one() {
        let store = InMemoryDocumentStore::new();
        store
            .insert_one(
                "sessions",
                doc(json!({"user_id": "u1", "jwt": "t"})),
                Durability::Default,
            )
            .await
            .expect("Insert should succeed");

        let filter = FieldFilter::eq("user_id", "u1");
        let first = store
            .delete_one("sessions", &filter, Durability::Default)
            .await
            .expect("Delete should succeed");
        let second = store
            .delete_one("sessions", &filter, Durability::Default)
            .await
            .expect("Delete should succeed");

        assert_eq!(first, WriteAck::acknowledged(1));
        assert_eq!(second, WriteAck::acknowledged(0));
    }

    #[tokio::test]
    async fn test_unacknowledged_store_still_applies_writes() {
        let store = InMemoryDocumentStore::unacknowledged();

        let ack = store
            .insert_one("users", doc(json!({"email": "a@b.com"})), Durability::Default)
            .await
            .expect("Insert should succeed");

        assert!(!ack.acknowledged);
        assert!(
            store
                .find_one("users", &FieldFilter::eq("email", "a@b.com"))
                .await
                .expect("Find should succeed")
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_ensure_unique_over_existing_duplicates_fails() {
        let store = InMemoryDocumentStore::new();
        for name in ["first", "second"] {
            store
                .insert_one(
                    "users",
                    doc(json!({"email": "dup@b.com", "name": name})),
                    Durability::Default,
                )
                .await
                .expect("Insert should succeed");
        }

        let result = store.ensure_unique("users", "email").await;
        assert_eq!(
            result,
            Err(StorageError::DuplicateKey {
                collection: "users".to_string(),
                field: "email".to_string(),
            })
        );

        // The constraint was not recorded, so further inserts still go through
        store
            .insert_one("users", doc(json!({"email": "dup@b.com"})), Durability::Default)
            .await
            .expect("Insert should succeed without a constraint");

        // Distinct values are fine
        store
            .ensure_unique("users", "name")
            .await
            .expect("Distinct names should accept the constraint");
    }

    #[tokio::test]
    async fn test_ensure_unique_rejects_invalid_names() {
        let store = InMemoryDocumentStore::new();

        let result = store.ensure_unique("users", "email; drop").await;

        assert!(matches!(result, Err(StorageError::InvalidName(_))));
    }
}
