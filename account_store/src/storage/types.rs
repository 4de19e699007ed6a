use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::storage::errors::StorageError;

/// A schema-less record as seen at the document store boundary
pub type Document = Map<String, Value>;

/// Exact match of a single top-level string field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    pub field: String,
    pub value: String,
}

impl FieldFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether `doc` carries `value` as a string under `field`
    pub fn matches(&self, doc: &Document) -> bool {
        matches!(doc.get(&self.field), Some(Value::String(v)) if *v == self.value)
    }
}

/// Write concern requested for a single write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Durability {
    #[default]
    Default,
    /// Acknowledged only once a majority of replica set members accepted the write
    Majority,
}

/// Outcome of a write as reported by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteAck {
    /// Whether the store confirmed the write per the requested durability
    pub acknowledged: bool,
    /// Number of documents the write applied to
    pub matched: u64,
}

impl WriteAck {
    pub(crate) fn acknowledged(matched: u64) -> Self {
        Self {
            acknowledged: true,
            matched,
        }
    }
}

/// Generic document store over named collections.
///
/// Implementations hold their own connection state and are shared as
/// `Arc<dyn DocumentStore>`; every method takes `&self`.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Enforce uniqueness of `field` within `collection`. Calling it again is a no-op.
    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<(), StorageError>;

    /// Return the first document matching `filter`, if any.
    async fn find_one(
        &self,
        collection: &str,
        filter: &FieldFilter,
    ) -> Result<Option<Document>, StorageError>;

    /// Insert a single document.
    ///
    /// Fails with [`StorageError::DuplicateKey`] when a uniqueness constraint is violated.
    async fn insert_one(
        &self,
        collection: &str,
        doc: Document,
        durability: Durability,
    ) -> Result<WriteAck, StorageError>;

    /// Set the top-level fields in `set` on at most one document matching `filter`.
    /// Never inserts.
    async fn update_one(
        &self,
        collection: &str,
        filter: &FieldFilter,
        set: Document,
        durability: Durability,
    ) -> Result<WriteAck, StorageError>;

    /// Delete at most one document matching `filter`.
    async fn delete_one(
        &self,
        collection: &str,
        filter: &FieldFilter,
        durability: Durability,
    ) -> Result<WriteAck, StorageError>;
}

/// Collection and field names end up in SQL identifiers and index names,
/// so only plain identifiers are accepted.
pub(crate) fn validate_name(name: &str) -> Result<(), StorageError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid && name.len() <= 63 {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("Expected a JSON object"),
        }
    }

    #[test]
    fn test_filter_matches_string_field() {
        let filter = FieldFilter::eq("email", "a@b.com");

        assert!(filter.matches(&doc(json!({"email": "a@b.com", "name": "A"}))));
        assert!(!filter.matches(&doc(json!({"email": "x@b.com"}))));
        assert!(!filter.matches(&doc(json!({"name": "A"}))));
    }

    #[test]
    fn test_filter_ignores_non_string_values() {
        let filter = FieldFilter::eq("user_id", "1");

        assert!(!filter.matches(&doc(json!({"user_id": 1}))));
        assert!(!filter.matches(&doc(json!({"user_id": ["1"]}))));
    }

    #[test]
    fn test_durability_default() {
        assert_eq!(Durability::default(), Durability::Default);
    }

    #[test]
    fn test_validate_name_accepts_identifiers() {
        for name in ["users", "sessions", "user_id", "_private", "o2p_users2"] {
            assert!(validate_name(name).is_ok(), "{name} should be accepted");
        }
    }

    #[test]
    fn test_validate_name_rejects_injection_attempts() {
        let long_name = "a".repeat(64);
        let attempts = [
            "",
            "1users",
            "users; DROP TABLE users",
            "users'--",
            "$where",
            "a.b",
            "na me",
            long_name.as_str(),
        ];

        for name in attempts {
            assert!(
                matches!(validate_name(name), Err(StorageError::InvalidName(_))),
                "{name:?} should be rejected"
            );
        }
    }
}
