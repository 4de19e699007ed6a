use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::storage::errors::StorageError;
use crate::storage::sql_common::{CreatedTables, map_write_error, table_name, unique_index_name};
use crate::storage::types::{
    Document, DocumentStore, Durability, FieldFilter, WriteAck, validate_name,
};

/// Documents stored as JSON text, one table per collection
#[derive(Clone, Debug)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
    table_prefix: String,
    created: CreatedTables,
}

impl SqliteDocumentStore {
    /// Create a lazily connecting store.
    ///
    /// In-memory databases live only as long as their connection, so they get
    /// a pool of exactly one connection that is never recycled.
    pub fn connect_lazy(url: &str, table_prefix: &str) -> Result<Self, StorageError> {
        let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect_lazy_with(opts)
        } else {
            SqlitePool::connect_lazy_with(opts)
        };

        Ok(Self {
            pool,
            table_prefix: table_prefix.to_string(),
            created: CreatedTables::default(),
        })
    }

    // Created at first use so that fresh in-memory databases work
    async fn ensure_table(&self, collection: &str) -> Result<String, StorageError> {
        let table = table_name(&self.table_prefix, collection)?;

        let pool = &self.pool;
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                body TEXT NOT NULL
            )
            "#
        );
        self.created
            .ensure(&table, move || async move {
                sqlx::query(&ddl).execute(pool).await.map(|_| ())
            })
            .await?;

        Ok(table)
    }
}

fn json_path(field: &str) -> Result<String, StorageError> {
    validate_name(field)?;
    Ok(format!("$.{field}"))
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<(), StorageError> {
        let table = self.ensure_table(collection).await?;
        let path = json_path(field)?;
        let index = unique_index_name(&table, field);

        // Index expressions cannot take bound parameters
        sqlx::query(&format!(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS {index} ON {table} (json_extract(body, '{path}'))
            "#
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &FieldFilter,
    ) -> Result<Option<Document>, StorageError> {
        let table = self.ensure_table(collection).await?;
        let path = json_path(&filter.field)?;

        let body: Option<String> = sqlx::query_scalar(&format!(
            r#"
            SELECT body FROM {table} WHERE json_extract(body, ?) = ? ORDER BY id LIMIT 1
            "#
        ))
        .bind(path)
        .bind(&filter.value)
        .fetch_optional(&self.pool)
        .await?;

        body.map(|body| serde_json::from_str::<Document>(&body).map_err(StorageError::from))
            .transpose()
    }

    async fn insert_one(
        &self,
        collection: &str,
        doc: Document,
        _durability: Durability,
    ) -> Result<WriteAck, StorageError> {
        let table = self.ensure_table(collection).await?;
        let body = serde_json::to_string(&doc)?;

        let result = sqlx::query(&format!(
            r#"
            INSERT INTO {table} (body) VALUES (?)
            "#
        ))
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, collection, &table))?;

        Ok(WriteAck::acknowledged(result.rows_affected()))
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &FieldFilter,
        set: Document,
        _durability: Durability,
    ) -> Result<WriteAck, StorageError> {
        let table = self.ensure_table(collection).await?;
        let path = json_path(&filter.field)?;

        // One statement, so concurrent writers queue on the busy timeout
        // instead of failing a read-to-write lock upgrade
        let body = if set.is_empty() {
            "body".to_string()
        } else {
            format!("json_set(body{})", ", ?, json(?)".repeat(set.len()))
        };
        let sql = format!(
            r#"
            UPDATE {table} SET body = {body} WHERE id = (
                SELECT id FROM {table} WHERE json_extract(body, ?) = ? ORDER BY id LIMIT 1
            )
            "#
        );

        let mut query = sqlx::query(&sql);
        for (field, value) in &set {
            query = query
                .bind(json_path(field)?)
                .bind(serde_json::to_string(value)?);
        }

        let result = query
            .bind(path)
            .bind(&filter.value)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, collection, &table))?;

        Ok(WriteAck::acknowledged(result.rows_affected()))
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: &FieldFilter,
        _durability: Durability,
    ) -> Result<WriteAck, StorageError> {
        let table = self.ensure_table(collection).await?;
        let path = json_path(&filter.field)?;

        let result = sqlx::query(&format!(
            r#"
            DELETE FROM {table} WHERE id = (
                SELECT id FROM {table} WHERE json_extract(body, ?) = ? ORDER BY id LIMIT 1
            )
            "#
        ))
        .bind(path)
        .bind(&filter.value)
        .execute(&self.pool)
        .await?;

        Ok(WriteAck::acknowledged(result.rows_affected()))
    }
}
