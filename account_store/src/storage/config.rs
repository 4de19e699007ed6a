//! Document store configuration

use std::{env, fmt, str::FromStr, sync::Arc};

use url::Url;

use super::errors::StorageError;
use super::memory::InMemoryDocumentStore;
use super::mongo::MongoDocumentStore;
use super::postgres::PostgresDocumentStore;
use super::sqlite::SqliteDocumentStore;
use super::types::DocumentStore;

const DEFAULT_DATABASE: &str = "mflix";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    Memory,
    Sqlite,
    Postgres,
    MongoDb,
}

impl FromStr for StoreType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            "postgres" => Ok(Self::Postgres),
            "mongodb" => Ok(Self::MongoDb),
            t => Err(StorageError::Config(format!(
                "Unsupported store type: {t}. Supported types are 'memory', 'sqlite', 'postgres' and 'mongodb'"
            ))),
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::MongoDb => "mongodb",
        };
        f.write_str(name)
    }
}

/// Where and how documents are stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub store_type: StoreType,
    /// Connection URL; unused by the in-memory store
    pub url: String,
    /// Database name, MongoDB only
    pub database: String,
    /// Prefix for table names, SQL stores only
    pub table_prefix: String,
}

impl StoreConfig {
    /// Read `GENERIC_DATA_STORE_TYPE`, `GENERIC_DATA_STORE_URL`,
    /// `GENERIC_DATA_STORE_DATABASE` and `DB_TABLE_PREFIX`.
    pub fn from_env() -> Result<Self, StorageError> {
        let store_type: StoreType = env::var("GENERIC_DATA_STORE_TYPE")
            .map_err(|_| StorageError::Config("GENERIC_DATA_STORE_TYPE must be set".to_string()))?
            .parse()?;

        let url = match (store_type, env::var("GENERIC_DATA_STORE_URL")) {
            (_, Ok(url)) => url,
            (StoreType::Memory, Err(_)) => String::new(),
            (_, Err(_)) => {
                return Err(StorageError::Config(
                    "GENERIC_DATA_STORE_URL must be set".to_string(),
                ));
            }
        };

        Ok(Self {
            store_type,
            url,
            database: env::var("GENERIC_DATA_STORE_DATABASE")
                .unwrap_or_else(|_| DEFAULT_DATABASE.to_string()),
            table_prefix: env::var("DB_TABLE_PREFIX").unwrap_or_default(),
        })
    }

    pub fn memory() -> Self {
        Self {
            store_type: StoreType::Memory,
            url: String::new(),
            database: DEFAULT_DATABASE.to_string(),
            table_prefix: String::new(),
        }
    }
}

/// `url` with its password masked, safe to log
fn redacted_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() && parsed.set_password(Some("****")).is_err() {
                return "<redacted>".to_string();
            }
            parsed.to_string()
        }
        // Unparseable URLs such as multi-host MongoDB ones may still carry credentials
        Err(_) if url.contains('@') => "<redacted>".to_string(),
        Err(_) => url.to_string(),
    }
}

/// Build the configured document store.
///
/// SQL pools connect lazily; the MongoDB client connects on first operation.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>, StorageError> {
    tracing::info!(
        "Initializing document store with type: {}, url: {}",
        config.store_type,
        redacted_url(&config.url)
    );

    let store: Arc<dyn DocumentStore> = match config.store_type {
        StoreType::Memory => Arc::new(InMemoryDocumentStore::new()),
        StoreType::Sqlite => Arc::new(SqliteDocumentStore::connect_lazy(
            &config.url,
            &config.table_prefix,
        )?),
        StoreType::Postgres => Arc::new(PostgresDocumentStore::connect_lazy(
            &config.url,
            &config.table_prefix,
        )?),
        StoreType::MongoDb => {
            Arc::new(MongoDocumentStore::connect(&config.url, &config.database).await?)
        }
    };

    tracing::info!(store_type = %config.store_type, "Document store ready");

    Ok(store)
}
