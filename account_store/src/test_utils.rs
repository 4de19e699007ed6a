//! Test utilities module for shared test initialization and helpers
//!
//! Tests that go through the environment-configured store call
//! [`init_test_environment`] first and are marked `#[serial]`, since other
//! tests modify the same environment variables.

use std::sync::Once;

use crate::storage::{StoreConfig, StoreType, connect};
use crate::userdb::UserAccountStore;

/// Load `.env_test` (falling back to `.env`) once per test binary
pub async fn init_test_environment() {
    static ENV_INIT: Once = Once::new();
    ENV_INIT.call_once(|| {
        if dotenvy::from_filename(".env_test").is_err() {
            dotenvy::dotenv().ok();
        }
    });
}

/// An initialized account store built from the test environment.
///
/// Without a usable configuration this falls back to an in-memory SQLite database.
pub async fn test_account_store() -> UserAccountStore {
    let config = StoreConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Warning: Using in-memory SQLite, store config unavailable: {e}");
        StoreConfig {
            store_type: StoreType::Sqlite,
            url: "sqlite::memory:".to_string(),
            ..StoreConfig::memory()
        }
    });

    let store = connect(&config)
        .await
        .expect("Failed to connect test document store");
    let accounts = UserAccountStore::new(store);
    accounts
        .init()
        .await
        .expect("Failed to initialize test account store");
    accounts
}
