mod config;
mod errors;
mod memory;
mod mongo;
mod postgres;
mod sql_common;
mod sqlite;
mod types;

pub use config::{StoreConfig, StoreType, connect};
pub use errors::StorageError;
pub use memory::InMemoryDocumentStore;
pub use mongo::MongoDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use sqlite::SqliteDocumentStore;
pub use types::{Document, DocumentStore, Durability, FieldFilter, WriteAck};
