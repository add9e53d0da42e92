//! Document backend: a repository over any [`DocumentStore`].

use std::fmt::Debug;
use std::sync::Arc;

use super::memory::MemoryDocumentStore;
use super::store::DocumentStore;

/// Document backend for diagnostic aggregates.
///
/// Every entity is a document with a generated UUID, relations are id fields,
/// and writes for one aggregate are staged into a single atomic batch.
#[derive(Clone)]
pub struct DocumentBackend {
    store: Arc<dyn DocumentStore>,
}

impl Debug for DocumentBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentBackend")
            .field("store", &self.store.store_name())
            .finish()
    }
}

impl DocumentBackend {
    /// Wraps an existing store client.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        tracing::info!(store = store.store_name(), "Document backend initialized");
        Self { store }
    }

    /// Backend over a fresh in-process store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryDocumentStore::new()))
    }

    /// Connects to MongoDB. Multi-document commits need a replica set or a
    /// sharded cluster.
    #[cfg(feature = "mongodb")]
    pub async fn connect_mongodb(
        uri: &str,
        database: &str,
    ) -> crate::error::StorageResult<Self> {
        let store = super::mongo::MongoDocumentStore::connect(uri, database).await?;
        Ok(Self::new(Arc::new(store)))
    }

    /// The underlying store client.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }
}
