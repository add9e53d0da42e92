//! MongoDB document store.
//!
//! Documents are stored with their id in `_id`. Batches are committed inside
//! a multi-document transaction, which requires a replica set or a sharded
//! cluster.

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, Bson, Document as BsonDocument};
use mongodb::error::{ErrorKind, TRANSIENT_TRANSACTION_ERROR};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use serde_json::Value;

use crate::error::{BackendError, StorageError, StorageResult};

use super::batch::MAX_BATCH_WRITES;
use super::store::{
    Document, DocumentStore, DocumentStoreError, StoredDocument, WriteBatch, WriteOp,
};

pub struct MongoDocumentStore {
    client: Client,
    database: Database,
}

impl MongoDocumentStore {
    /// Connects and verifies the server is reachable.
    pub async fn connect(uri: &str, database: &str) -> StorageResult<Self> {
        let connection_failed = |message: String| {
            StorageError::Backend(BackendError::ConnectionFailed {
                backend_name: "mongodb".to_string(),
                message,
            })
        };

        let options = ClientOptions::parse(uri)
            .await
            .map_err(|e| connection_failed(e.to_string()))?;
        let client = Client::with_options(options).map_err(|e| connection_failed(e.to_string()))?;
        let store = Self {
            database: client.database(database),
            client,
        };
        store
            .ping()
            .await
            .map_err(|e| connection_failed(e.to_string()))?;

        tracing::info!(database, "Connected to MongoDB");
        Ok(store)
    }

    fn collection(&self, name: &str) -> Collection<BsonDocument> {
        self.database.collection(name)
    }

    async fn collect(
        &self,
        collection: &str,
        filter: BsonDocument,
    ) -> Result<Vec<StoredDocument>, DocumentStoreError> {
        let mut cursor = self
            .collection(collection)
            .find(filter)
            .sort(doc! { "_id": 1 })
            .await
            .map_err(map_mongo_error)?;

        let mut documents = Vec::new();
        while cursor.advance().await.map_err(map_mongo_error)? {
            let current = cursor.deserialize_current().map_err(map_mongo_error)?;
            documents.push(from_bson(current)?);
        }
        Ok(documents)
    }
}

fn map_mongo_error(err: mongodb::error::Error) -> DocumentStoreError {
    if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
        return DocumentStoreError::Aborted(err.to_string());
    }
    match err.kind.as_ref() {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(..)
        | ErrorKind::ConnectionPoolCleared { .. } => DocumentStoreError::Unavailable(err.to_string()),
        ErrorKind::InvalidArgument { .. } => DocumentStoreError::InvalidInput(err.to_string()),
        _ => DocumentStoreError::Internal(err.to_string()),
    }
}

fn to_bson(data: &Document) -> Result<BsonDocument, DocumentStoreError> {
    match Bson::try_from(Value::Object(data.clone())) {
        Ok(Bson::Document(document)) => Ok(document),
        Ok(other) => Err(DocumentStoreError::InvalidInput(format!(
            "expected a document, converted {}",
            other
        ))),
        Err(e) => Err(DocumentStoreError::InvalidInput(e.to_string())),
    }
}

fn from_bson(mut document: BsonDocument) -> Result<StoredDocument, DocumentStoreError> {
    let id = match document.remove("_id") {
        Some(Bson::String(id)) => id,
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(other) => other.to_string(),
        None => {
            return Err(DocumentStoreError::Internal(
                "stored document has no _id".to_string(),
            ));
        }
    };
    // Native dates come back as {"$date": ...}, which date normalization reads.
    match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(data) => Ok(StoredDocument::new(id, data)),
        other => Err(DocumentStoreError::Internal(format!(
            "stored document converted to {}",
            other
        ))),
    }
}

/// Filter matching a document by the id [`from_bson`] reported for it.
///
/// Documents written by other producers may carry a native `ObjectId`, which
/// is reported as its hex string.
fn id_filter(id: &str) -> BsonDocument {
    match ObjectId::parse_str(id) {
        Ok(oid) => doc! { "_id": { "$in": [id, oid] } },
        Err(_) => doc! { "_id": id },
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    fn store_name(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> Result<(), DocumentStoreError> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(map_mongo_error)?;
        Ok(())
    }

    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<StoredDocument>, DocumentStoreError> {
        self.collection(collection)
            .find_one(id_filter(id))
            .await
            .map_err(map_mongo_error)?
            .map(from_bson)
            .transpose()
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, DocumentStoreError> {
        let value = Bson::try_from(value.clone())
            .map_err(|e| DocumentStoreError::InvalidInput(e.to_string()))?;
        let mut filter = BsonDocument::new();
        filter.insert(field, value);
        self.collect(collection, filter).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, DocumentStoreError> {
        self.collect(collection, BsonDocument::new()).await
    }

    async fn list_ids(
        &self,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<String>, DocumentStoreError> {
        let mut cursor = self
            .collection(collection)
            .find(BsonDocument::new())
            .projection(doc! { "_id": 1 })
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await
            .map_err(map_mongo_error)?;

        let mut ids = Vec::new();
        while cursor.advance().await.map_err(map_mongo_error)? {
            let current = cursor.deserialize_current().map_err(map_mongo_error)?;
            ids.push(from_bson(current)?.id);
        }
        Ok(ids)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), DocumentStoreError> {
        if batch.len() > MAX_BATCH_WRITES {
            return Err(DocumentStoreError::InvalidInput(format!(
                "batch of {} writes exceeds the limit of {}",
                batch.len(),
                MAX_BATCH_WRITES
            )));
        }
        if batch.is_empty() {
            return Ok(());
        }

        let mut writes = Vec::with_capacity(batch.len());
        for op in batch.into_ops() {
            let body = match &op {
                WriteOp::Set { id, document, .. } => {
                    let mut body = to_bson(document)?;
                    body.insert("_id", id.as_str());
                    Some(body)
                }
                WriteOp::Delete { .. } => None,
            };
            writes.push((op, body));
        }

        let mut session = self.client.start_session().await.map_err(map_mongo_error)?;
        session
            .start_transaction()
            .await
            .map_err(map_mongo_error)?;

        for (op, body) in writes {
            let result = match (op, body) {
                (WriteOp::Set { collection, id, .. }, Some(body)) => self
                    .collection(collection)
                    .replace_one(doc! { "_id": id.as_str() }, body)
                    .upsert(true)
                    .session(&mut session)
                    .await
                    .map(|_| ()),
                (WriteOp::Delete { collection, id }, _) => self
                    .collection(collection)
                    .delete_one(id_filter(&id))
                    .session(&mut session)
                    .await
                    .map(|_| ()),
                (WriteOp::Set { .. }, None) => Ok(()),
            };

            if let Err(e) = result {
                if let Err(abort) = session.abort_transaction().await {
                    tracing::warn!(error = %abort, "Failed to abort MongoDB transaction");
                }
                return Err(map_mongo_error(e));
            }
        }

        session
            .commit_transaction()
            .await
            .map_err(map_mongo_error)?;
        Ok(())
    }
}
