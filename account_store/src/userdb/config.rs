use std::{env, sync::LazyLock};

/// Users collection name
pub(crate) static DB_COLLECTION_USERS: LazyLock<String> =
    LazyLock::new(|| env::var("DB_COLLECTION_USERS").unwrap_or_else(|_| "users".to_string()));

/// Sessions collection name
pub(crate) static DB_COLLECTION_SESSIONS: LazyLock<String> = LazyLock::new(|| {
    env::var("DB_COLLECTION_SESSIONS").unwrap_or_else(|_| "sessions".to_string())
});

pub(super) const EMAIL_FIELD: &str = "email";
pub(super) const USER_ID_FIELD: &str = "user_id";
pub(super) const JWT_FIELD: &str = "jwt";
pub(super) const PREFERENCES_FIELD: &str = "preferences";
