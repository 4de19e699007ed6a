use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::storage::Document;
use crate::userdb::errors::AccountError;

/// Open-ended user preferences, replaced as a whole on update
pub type Preferences = Map<String, Value>;

/// A registered user, unique by email
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// Display name
    pub name: String,
    /// Unique user identifier
    pub email: String,
    #[serde(rename = "hashedpw", default)]
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            name,
            email,
            password_hash,
            preferences: None,
            is_admin: false,
        }
    }
}

/// The JWT currently issued to a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub jwt: String,
}

pub(super) fn to_document<T: Serialize>(value: &T) -> Result<Document, AccountError> {
    match serde_json::to_value(value)? {
        Value::Object(doc) => Ok(doc),
        other => Err(AccountError::InvalidData(format!(
            "Expected an object, got {other}"
        ))),
    }
}

pub(super) fn from_document<T: serde::de::DeserializeOwned>(
    doc: Document,
) -> Result<T, AccountError> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}
