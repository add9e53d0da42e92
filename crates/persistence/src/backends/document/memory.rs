//! In-process document store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use super::batch::MAX_BATCH_WRITES;
use super::store::{
    Document, DocumentStore, DocumentStoreError, StoredDocument, WriteBatch, WriteOp,
};

type Collection = BTreeMap<String, Document>;

/// A [`DocumentStore`] held in memory.
///
/// Commits are applied under one write lock, so readers never observe a
/// partially applied batch.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn store_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), DocumentStoreError> {
        Ok(())
    }

    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<StoredDocument>, DocumentStoreError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| StoredDocument::new(id, data.clone())))
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, DocumentStoreError> {
        let collections = self.collections.read();
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .iter()
            .filter(|(_, data)| data.get(field) == Some(value))
            .map(|(id, data)| StoredDocument::new(id.clone(), data.clone()))
            .collect())
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, DocumentStoreError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| StoredDocument::new(id.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_ids(
        &self,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<String>, DocumentStoreError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|docs| docs.keys().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), DocumentStoreError> {
        if batch.len() > MAX_BATCH_WRITES {
            return Err(DocumentStoreError::InvalidInput(format!(
                "batch of {} writes exceeds the limit of {}",
                batch.len(),
                MAX_BATCH_WRITES
            )));
        }

        let mut collections = self.collections.write();
        for op in batch.into_ops() {
            match op {
                WriteOp::Set {
                    collection,
                    id,
                    document,
                } => {
                    collections
                        .entry(collection.to_string())
                        .or_default()
                        .insert(id, document);
                }
                WriteOp::Delete { collection, id } => {
                    if let Some(docs) = collections.get_mut(collection) {
                        docs.remove(&id);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_commit_and_read() {
        let store = MemoryDocumentStore::new();
        let mut batch = WriteBatch::new();
        batch.set("organs", "b", doc(json!({"label": "Heart"})));
        batch.set("organs", "a", doc(json!({"label": "Liver"})));
        store.commit(batch).await.unwrap();

        let found = store.get("organs", "b").await.unwrap().unwrap();
        assert_eq!(found.str_field("label"), Some("Heart"));
        assert!(store.get("organs", "zzz").await.unwrap().is_none());
        assert!(store.get("missing", "b").await.unwrap().is_none());

        let ids: Vec<_> = store
            .list("organs")
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);

        let hearts = store
            .find_by_field("organs", "label", &json!("Heart"))
            .await
            .unwrap();
        assert_eq!(hearts.len(), 1);
        assert_eq!(hearts[0].id, "b");
    }

    #[tokio::test]
    async fn test_oversized_batch_is_rejected_whole() {
        let store = MemoryDocumentStore::new();
        let mut batch = WriteBatch::new();
        for i in 0..=MAX_BATCH_WRITES {
            batch.set("units", format!("u{i:04}"), Document::new());
        }

        let err = store.commit(batch).await.unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidInput(_)));
        assert_eq!(store.count("units"), 0);
    }

    #[tokio::test]
    async fn test_list_ids_limit_and_delete() {
        let store = MemoryDocumentStore::new();
        let mut batch = WriteBatch::new();
        for i in 0..5 {
            batch.set("units", format!("u{i}"), Document::new());
        }
        store.commit(batch).await.unwrap();

        let ids = store.list_ids("units", 3).await.unwrap();
        assert_eq!(ids, vec!["u0", "u1", "u2"]);

        let mut batch = WriteBatch::new();
        for id in ids {
            batch.delete("units", id);
        }
        batch.delete("units", "never-existed");
        store.commit(batch).await.unwrap();
        assert_eq!(store.count("units"), 2);
    }
}
