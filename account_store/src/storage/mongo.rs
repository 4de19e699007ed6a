use async_trait::async_trait;
use mongodb::bson::{self, Bson};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{
    Acknowledgment, DeleteOptions, IndexOptions, InsertOneOptions, UpdateOptions, WriteConcern,
};
use mongodb::{Client, Collection, Database, IndexModel};

use crate::storage::errors::StorageError;
use crate::storage::types::{
    Document, DocumentStore, Durability, FieldFilter, WriteAck, validate_name,
};

const DUPLICATE_KEY_CODE: i32 = 11000;
const UNIQUE_INDEX_SUFFIX: &str = "_unique";

/// Native MongoDB collections inside one database
#[derive(Clone, Debug)]
pub struct MongoDocumentStore {
    db: Database,
}

impl MongoDocumentStore {
    /// Build a client for `uri`. The driver connects on first use.
    pub async fn connect(uri: &str, database: &str) -> Result<Self, StorageError> {
        let client = Client::with_uri_str(uri).await?;
        tracing::info!(database, "Created MongoDB client");
        Ok(Self {
            db: client.database(database),
        })
    }

    fn collection(&self, name: &str) -> Result<Collection<bson::Document>, StorageError> {
        validate_name(name)?;
        Ok(self.db.collection(name))
    }
}

fn write_concern(durability: Durability) -> Option<WriteConcern> {
    match durability {
        Durability::Default => None,
        Durability::Majority => Some(WriteConcern::builder().w(Acknowledgment::Majority).build()),
    }
}

fn filter_document(filter: &FieldFilter) -> Result<bson::Document, StorageError> {
    validate_name(&filter.field)?;
    let mut doc = bson::Document::new();
    doc.insert(filter.field.clone(), filter.value.clone());
    Ok(doc)
}

fn to_bson(doc: &Document) -> Result<bson::Document, StorageError> {
    bson::to_document(doc).map_err(|e| StorageError::Serde(e.to_string()))
}

fn from_bson(mut doc: bson::Document) -> Result<Document, StorageError> {
    doc.remove("_id");
    bson::from_document(doc).map_err(|e| StorageError::Serde(e.to_string()))
}

/// Server messages look like `... index: email_unique dup key: { ... }`
fn duplicate_field(message: &str) -> String {
    message
        .split_once("index: ")
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .and_then(|index| index.strip_suffix(UNIQUE_INDEX_SUFFIX))
        .unwrap_or("unknown")
        .to_string()
}

fn map_write_error(err: mongodb::error::Error, collection: &str) -> StorageError {
    if let ErrorKind::Write(WriteFailure::WriteError(write_error)) = &*err.kind {
        if write_error.code == DUPLICATE_KEY_CODE {
            return StorageError::DuplicateKey {
                collection: collection.to_string(),
                field: duplicate_field(&write_error.message),
            };
        }
    }
    StorageError::from(err)
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<(), StorageError> {
        validate_name(field)?;
        let coll = self.collection(collection)?;

        let mut keys = bson::Document::new();
        keys.insert(field, 1);
        let index = IndexModel::builder()
            .keys(keys)
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name(format!("{field}{UNIQUE_INDEX_SUFFIX}"))
                    .build(),
            )
            .build();

        coll.create_index(index).await?;
        tracing::debug!(collection, field, "Ensured unique index");
        Ok(())
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &FieldFilter,
    ) -> Result<Option<Document>, StorageError> {
        let coll = self.collection(collection)?;
        let found = coll.find_one(filter_document(filter)?).await?;
        found.map(from_bson).transpose()
    }

    async fn insert_one(
        &self,
        collection: &str,
        doc: Document,
        durability: Durability,
    ) -> Result<WriteAck, StorageError> {
        let coll = self.collection(collection)?;
        let options = InsertOneOptions::builder()
            .write_concern(write_concern(durability))
            .build();

        coll.insert_one(to_bson(&doc)?)
            .with_options(options)
            .await
            .map_err(|e| map_write_error(e, collection))?;

        Ok(WriteAck::acknowledged(1))
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &FieldFilter,
        set: Document,
        durability: Durability,
    ) -> Result<WriteAck, StorageError> {
        let coll = self.collection(collection)?;
        let mut update = bson::Document::new();
        update.insert("$set", Bson::Document(to_bson(&set)?));
        let options = UpdateOptions::builder()
            .write_concern(write_concern(durability))
            .build();

        let result = coll
            .update_one(filter_document(filter)?, update)
            .with_options(options)
            .await
            .map_err(|e| map_write_error(e, collection))?;

        Ok(WriteAck::acknowledged(result.matched_count))
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: &FieldFilter,
        durability: Durability,
    ) -> Result<WriteAck, StorageError> {
        let coll = self.collection(collection)?;
        let options = DeleteOptions::builder()
            .write_concern(write_concern(durability))
            .build();

        let result = coll
            .delete_one(filter_document(filter)?)
            .with_options(options)
            .await?;

        Ok(WriteAck::acknowledged(result.deleted_count))
    }
}
