use thiserror::Error;

use crate::storage::StorageError;

#[derive(Clone, Error, Debug, PartialEq)]
pub enum AccountError {
    /// A record with the same unique key already exists
    #[error("Duplicate entity: {0}")]
    DuplicateEntity(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A stored document could not be decoded into an entity
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Error from the underlying document store
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<serde_json::Error> for AccountError {
    fn from(err: serde_json::Error) -> Self {
        AccountError::InvalidData(err.to_string())
    }
}
