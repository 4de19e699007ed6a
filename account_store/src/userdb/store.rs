use std::sync::Arc;

use crate::storage::{Document, DocumentStore, Durability, FieldFilter, StorageError};
use crate::userdb::config::{
    DB_COLLECTION_SESSIONS, DB_COLLECTION_USERS, EMAIL_FIELD, JWT_FIELD, PREFERENCES_FIELD,
    USER_ID_FIELD,
};
use crate::userdb::errors::AccountError;
use crate::userdb::types::{Preferences, Session, User, from_document, to_document};

/// User and session persistence over a [`DocumentStore`].
///
/// Holds no mutable state; clones share the same store handle.
#[derive(Clone)]
pub struct UserAccountStore {
    store: Arc<dyn DocumentStore>,
    users: String,
    sessions: String,
}

impl UserAccountStore {
    /// Use the collections named by `DB_COLLECTION_USERS` / `DB_COLLECTION_SESSIONS`
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_collections(store, &DB_COLLECTION_USERS, &DB_COLLECTION_SESSIONS)
    }

    pub fn with_collections(store: Arc<dyn DocumentStore>, users: &str, sessions: &str) -> Self {
        Self {
            store,
            users: users.to_string(),
            sessions: sessions.to_string(),
        }
    }

    /// Have the store enforce unique emails and one session per user
    pub async fn init(&self) -> Result<(), AccountError> {
        self.store.ensure_unique(&self.users, EMAIL_FIELD).await?;
        self.store
            .ensure_unique(&self.sessions, USER_ID_FIELD)
            .await?;
        tracing::info!(users = %self.users, sessions = %self.sessions, "Account store initialized");
        Ok(())
    }

    /// Insert a new user, requiring majority acknowledgment.
    ///
    /// Returns whether the user can be read back after the insert.
    #[tracing::instrument(skip(self, user), fields(email = %user.email))]
    pub async fn add_user(&self, user: &User) -> Result<bool, AccountError> {
        if self.get_user(&user.email).await?.is_some() {
            tracing::info!("User already exists");
            return Err(AccountError::DuplicateEntity(format!(
                "User already exists: {}",
                user.email
            )));
        }

        let doc = to_document(user)?;
        match self
            .store
            .insert_one(&self.users, doc, Durability::Majority)
            .await
        {
            Ok(_) => {}
            Err(StorageError::DuplicateKey { .. }) => {
                tracing::info!("User insert rejected by unique constraint");
                return Err(AccountError::DuplicateEntity(format!(
                    "User already exists: {}",
                    user.email
                )));
            }
            Err(e) => {
                tracing::error!(error = %e, "User insert failed");
                return Err(e.into());
            }
        }

        let confirmed = self.get_user(&user.email).await?.is_some();
        tracing::info!(confirmed, "User insert completed");
        Ok(confirmed)
    }

    /// Set the JWT of the session stored for `user_id`.
    ///
    /// This is an update only: when no session exists for `user_id` nothing is
    /// written and the call still reports the store's acknowledgment.
    #[tracing::instrument(skip(self, jwt))]
    pub async fn create_user_session(&self, user_id: &str, jwt: &str) -> Result<bool, AccountError> {
        let mut set = Document::new();
        set.insert(JWT_FIELD.to_string(), jwt.into());

        let ack = self
            .store
            .update_one(
                &self.sessions,
                &FieldFilter::eq(USER_ID_FIELD, user_id),
                set,
                Durability::Default,
            )
            .await?;

        if ack.matched == 0 {
            tracing::debug!("No session matched, nothing was written");
        }
        tracing::info!(acknowledged = ack.acknowledged, "Session update completed");
        Ok(ack.acknowledged)
    }

    /// Store a new session for `user_id`, refusing to overwrite an existing one.
    #[tracing::instrument(skip(self, jwt))]
    pub async fn insert_user_session(&self, user_id: &str, jwt: &str) -> Result<bool, AccountError> {
        if self.get_user_session(user_id).await?.is_some() {
            return Err(AccountError::DuplicateEntity(format!(
                "Session already exists for user: {user_id}"
            )));
        }

        let session = Session {
            user_id: user_id.to_string(),
            jwt: jwt.to_string(),
        };

        let ack = self
            .store
            .insert_one(&self.sessions, to_document(&session)?, Durability::Default)
            .await
            .map_err(|e| match e {
                StorageError::DuplicateKey { .. } => AccountError::DuplicateEntity(format!(
                    "Session already exists for user: {user_id}"
                )),
                e => e.into(),
            })?;

        tracing::info!(acknowledged = ack.acknowledged, "Session insert completed");
        Ok(ack.acknowledged)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_user(&self, email: &str) -> Result<Option<User>, AccountError> {
        let found = self
            .store
            .find_one(&self.users, &FieldFilter::eq(EMAIL_FIELD, email))
            .await;

        match found {
            Ok(Some(doc)) => {
                tracing::debug!(found = true, "User lookup completed");
                Ok(Some(from_document(doc)?))
            }
            Ok(None) => {
                tracing::debug!(found = false, "User lookup completed - not found");
                Ok(None)
            }
            Err(e) => {
                tracing::error!(error = %e, "User lookup failed");
                Err(e.into())
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_user_session(&self, user_id: &str) -> Result<Option<Session>, AccountError> {
        self.store
            .find_one(&self.sessions, &FieldFilter::eq(USER_ID_FIELD, user_id))
            .await?
            .map(from_document)
            .transpose()
    }

    /// Delete the session of `user_id`. Reports acknowledgment even if there was none.
    #[tracing::instrument(skip(self))]
    pub async fn delete_user_sessions(&self, user_id: &str) -> Result<bool, AccountError> {
        let ack = self
            .store
            .delete_one(
                &self.sessions,
                &FieldFilter::eq(USER_ID_FIELD, user_id),
                Durability::Default,
            )
            .await?;

        tracing::info!(
            acknowledged = ack.acknowledged,
            deleted = ack.matched,
            "Session delete completed"
        );
        Ok(ack.acknowledged)
    }

    /// Delete the user and then its session.
    ///
    /// The two deletes are independent; if the second fails the session is left behind.
    /// The email is used as the session's user id.
    #[tracing::instrument(skip(self))]
    pub async fn delete_user(&self, email: &str) -> Result<bool, AccountError> {
        let ack = self
            .store
            .delete_one(
                &self.users,
                &FieldFilter::eq(EMAIL_FIELD, email),
                Durability::Default,
            )
            .await?;

        tracing::info!(
            acknowledged = ack.acknowledged,
            deleted = ack.matched,
            "User delete completed"
        );

        if !ack.acknowledged {
            tracing::warn!("User delete not acknowledged, leaving sessions untouched");
            return Ok(false);
        }

        self.delete_user_sessions(email).await
    }

    /// Replace the user's preferences wholesale. `None` is rejected.
    #[tracing::instrument(skip(self, preferences))]
    pub async fn update_user_preferences(
        &self,
        email: &str,
        preferences: Option<&Preferences>,
    ) -> Result<bool, AccountError> {
        let Some(preferences) = preferences else {
            return Err(AccountError::InvalidArgument(
                "User preferences cannot be null".to_string(),
            ));
        };

        let mut set = Document::new();
        set.insert(
            PREFERENCES_FIELD.to_string(),
            serde_json::Value::Object(preferences.clone()),
        );

        let ack = self
            .store
            .update_one(
                &self.users,
                &FieldFilter::eq(EMAIL_FIELD, email),
                set,
                Durability::Default,
            )
            .await?;

        tracing::info!(
            acknowledged = ack.acknowledged,
            matched = ack.matched,
            "Preferences update completed"
        );
        Ok(ack.acknowledged)
    }
}
