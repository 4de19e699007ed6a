//! Helpers shared by the SQL-backed document stores

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::storage::errors::StorageError;
use crate::storage::types::validate_name;

const UNIQUE_INDEX_SUFFIX: &str = "_unique";

/// Table holding the documents of `collection`
pub(super) fn table_name(prefix: &str, collection: &str) -> Result<String, StorageError> {
    validate_name(collection)?;
    let table = format!("{prefix}{collection}");
    validate_name(&table)?;
    Ok(table)
}

pub(super) fn unique_index_name(table: &str, field: &str) -> String {
    format!("{table}_{field}{UNIQUE_INDEX_SUFFIX}")
}

/// Recover the field name from an error text mentioning one of our unique indexes
pub(super) fn field_from_unique_violation(table: &str, text: &str) -> Option<String> {
    let marker = format!("{table}_");
    let start = text.find(&marker)? + marker.len();
    let rest = &text[start..];
    let end = rest.find(UNIQUE_INDEX_SUFFIX)?;
    let field = &rest[..end];
    validate_name(field).ok()?;
    Some(field.to_string())
}

/// Tables already created through one store handle.
///
/// Creation is serialized so each table sees its DDL once per handle.
#[derive(Clone, Debug, Default)]
pub(super) struct CreatedTables(Arc<Mutex<HashSet<String>>>);

impl CreatedTables {
    /// Run `create` unless `table` was already created through this handle
    pub(super) async fn ensure<F, Fut>(&self, table: &str, create: F) -> Result<(), StorageError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), sqlx::Error>>,
    {
        let mut created = self.0.lock().await;
        if created.contains(table) {
            return Ok(());
        }

        match create().await {
            Ok(()) => {}
            // Postgres: another session won the race on the catalog entry
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tracing::debug!(table, "Table was created concurrently");
            }
            Err(e) => {
                tracing::error!(table, error = %e, "Failed to create table");
                return Err(e.into());
            }
        }

        tracing::debug!(table, "Table ready");
        created.insert(table.to_string());
        Ok(())
    }
}

/// Map a failed write, turning unique violations into [`StorageError::DuplicateKey`]
pub(super) fn map_write_error(err: sqlx::Error, collection: &str, table: &str) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let field = db_err
                .constraint()
                .and_then(|name| field_from_unique_violation(table, name))
                .or_else(|| field_from_unique_violation(table, db_err.message()))
                .unwrap_or_else(|| "unknown".to_string());
            tracing::debug!(collection, field = %field, "Unique constraint rejected write");
            return StorageError::DuplicateKey {
                collection: collection.to_string(),
                field,
            };
        }
    }
    StorageError::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_with_prefix() {
        assert_eq!(table_name("acct_", "users").unwrap(), "acct_users");
        assert_eq!(table_name("", "sessions").unwrap(), "sessions");
    }

    #[test]
    fn test_table_name_rejects_bad_input() {
        assert!(table_name("", "users;--").is_err());
        assert!(table_name("bad prefix ", "users").is_err());
    }

    #[test]
    fn test_field_from_sqlite_message() {
        let message = "UNIQUE constraint failed: index 'users_email_unique'";
        assert_eq!(
            field_from_unique_violation("users", message),
            Some("email".to_string())
        );
    }

    #[test]
    fn test_field_from_postgres_constraint() {
        let constraint = unique_index_name("acct_sessions", "user_id");
        assert_eq!(
            field_from_unique_violation("acct_sessions", &constraint),
            Some("user_id".to_string())
        );
    }

    #[tokio::test]
    async fn test_created_tables_runs_ddl_once() {
        let tables = CreatedTables::default();
        let counter = std::sync::atomic::AtomicUsize::new(0);
        let calls = &counter;
        let create = move || async move {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        };

        tables
            .ensure("users", create)
            .await
            .expect("First create should succeed");
        tables
            .ensure("users", create)
            .await
            .expect("Second call should be skipped");
        tables
            .ensure("sessions", create)
            .await
            .expect("Other table should be created");

        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_created_tables_retries_after_failure() {
        let tables = CreatedTables::default();

        let failed = tables
            .ensure("users", || async { Err(sqlx::Error::PoolTimedOut) })
            .await;
        assert!(matches!(failed, Err(StorageError::Storage(_))));

        let mut ran = false;
        tables
            .ensure("users", || {
                ran = true;
                async { Ok(()) }
            })
            .await
            .expect("Create should run again after a failure");
        assert!(ran);
    }

    #[test]
    fn test_field_from_unrelated_message() {
        assert_eq!(
            field_from_unique_violation("users", "UNIQUE constraint failed: other.id"),
            None
        );
    }
}
