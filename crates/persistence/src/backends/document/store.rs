//! The document store seam.
//!
//! [`DocumentBackend`](super::DocumentBackend) only talks to a store
//! through [`DocumentStore`]: keyed JSON documents grouped in collections, an
//! equality query on one field and an atomic multi-document commit bounded by
//! [`MAX_BATCH_WRITES`](super::MAX_BATCH_WRITES).

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::{BackendError, StorageError, TransactionError};

/// A document body. The document id is kept outside the body.
pub type Document = Map<String, Value>;

/// A document together with its id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Document,
}

impl StoredDocument {
    pub fn new(id: impl Into<String>, data: Document) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Returns a string field.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }
}

/// Failures reported by a [`DocumentStore`].
#[derive(Debug, Clone, Error)]
pub enum DocumentStoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("commit aborted: {0}")]
    Aborted(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{0}")]
    Internal(String),
}

impl From<DocumentStoreError> for StorageError {
    fn from(err: DocumentStoreError) -> Self {
        match err {
            DocumentStoreError::Unavailable(message) => {
                StorageError::Backend(BackendError::Unavailable {
                    backend_name: "document".to_string(),
                    message,
                })
            }
            DocumentStoreError::Aborted(reason) => {
                StorageError::Transaction(TransactionError::RolledBack { reason })
            }
            DocumentStoreError::InvalidInput(message) | DocumentStoreError::Internal(message) => {
                StorageError::internal("document", message)
            }
        }
    }
}

/// One staged write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or overwrite a document.
    Set {
        collection: &'static str,
        id: String,
        document: Document,
    },
    /// Delete a document; deleting a missing document is not an error.
    Delete {
        collection: &'static str,
        id: String,
    },
}

impl WriteOp {
    pub fn collection(&self) -> &'static str {
        match self {
            WriteOp::Set { collection, .. } | WriteOp::Delete { collection, .. } => collection,
        }
    }
}

/// Writes committed together by [`DocumentStore::commit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, collection: &'static str, id: impl Into<String>, document: Document) {
        self.ops.push(WriteOp::Set {
            collection,
            id: id.into(),
            document,
        });
    }

    pub fn delete(&mut self, collection: &'static str, id: impl Into<String>) {
        self.ops.push(WriteOp::Delete {
            collection,
            id: id.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Client for a document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short name used in logs and errors.
    fn store_name(&self) -> &'static str;

    /// Round trip to the store.
    async fn ping(&self) -> Result<(), DocumentStoreError>;

    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<StoredDocument>, DocumentStoreError>;

    /// Every document whose `field` equals `value`, ordered by id.
    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, DocumentStoreError>;

    /// Every document in a collection, ordered by id.
    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, DocumentStoreError>;

    /// Up to `limit` document ids from a collection.
    async fn list_ids(
        &self,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<String>, DocumentStoreError>;

    /// Applies every write or none of them.
    ///
    /// Stores reject batches larger than [`MAX_BATCH_WRITES`](super::MAX_BATCH_WRITES)
    /// with [`DocumentStoreError::InvalidInput`].
    async fn commit(&self, batch: WriteBatch) -> Result<(), DocumentStoreError>;
}
