//! account_store - user and session persistence for the movie catalog
//!
//! [`UserAccountStore`] implements the account operations on top of a generic
//! [`DocumentStore`], with in-memory, SQLite, PostgreSQL and MongoDB backends.

mod storage;
mod userdb;

#[cfg(test)]
mod test_utils;

pub use storage::{
    Document, DocumentStore, Durability, FieldFilter, InMemoryDocumentStore, MongoDocumentStore,
    PostgresDocumentStore, SqliteDocumentStore, StorageError, StoreConfig, StoreType, WriteAck,
    connect,
};
pub use userdb::{AccountError, Preferences, Session, User, UserAccountStore};

/// Connect the store described by the environment and prepare its collections
pub async fn init() -> Result<UserAccountStore, AccountError> {
    let config = StoreConfig::from_env()?;
    let accounts = UserAccountStore::new(connect(&config).await?);
    accounts.init().await?;
    Ok(accounts)
}
