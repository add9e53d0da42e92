//! A document store that fails on demand.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use diagnovet_persistence::backends::document::{
    DocumentStore, DocumentStoreError, MemoryDocumentStore, StoredDocument, WriteBatch, WriteOp,
};

#[derive(Debug, Default)]
struct FailureState {
    commit_count: usize,
    fail_commit_after: Option<usize>,
    fail_lookups: bool,
    drop_deletes: bool,
    committed_batch_sizes: Vec<usize>,
}

/// Wraps a [`MemoryDocumentStore`] and injects failures.
#[derive(Clone, Default)]
pub struct FailingStore {
    inner: Arc<MemoryDocumentStore>,
    state: Arc<Mutex<FailureState>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits after the first `count` succeed fail with `Unavailable`.
    pub fn set_fail_commit_after(&self, count: usize) {
        let mut state = self.state.lock().unwrap();
        state.commit_count = 0;
        state.fail_commit_after = Some(count);
    }

    /// Field queries fail with `Unavailable`.
    pub fn set_fail_lookups(&self, fail: bool) {
        self.state.lock().unwrap().fail_lookups = fail;
    }

    /// Commits succeed but silently skip their deletes.
    pub fn set_drop_deletes(&self, drop: bool) {
        self.state.lock().unwrap().drop_deletes = drop;
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.fail_commit_after = None;
        state.fail_lookups = false;
        state.drop_deletes = false;
    }

    /// Sizes of every batch committed so far.
    pub fn committed_batch_sizes(&self) -> Vec<usize> {
        self.state.lock().unwrap().committed_batch_sizes.clone()
    }

    pub fn count(&self, collection: &str) -> usize {
        self.inner.count(collection)
    }
}

#[async_trait]
impl DocumentStore for FailingStore {
    fn store_name(&self) -> &'static str {
        "failing-memory"
    }

    async fn ping(&self) -> Result<(), DocumentStoreError> {
        self.inner.ping().await
    }

    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<StoredDocument>, DocumentStoreError> {
        self.inner.get(collection, id).await
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, DocumentStoreError> {
        if self.state.lock().unwrap().fail_lookups {
            return Err(DocumentStoreError::Unavailable(
                "forced lookup failure".to_string(),
            ));
        }
        self.inner.find_by_field(collection, field, value).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, DocumentStoreError> {
        self.inner.list(collection).await
    }

    async fn list_ids(
        &self,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<String>, DocumentStoreError> {
        self.inner.list_ids(collection, limit).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), DocumentStoreError> {
        let size = batch.len();
        let batch = {
            let mut state = self.state.lock().unwrap();
            state.commit_count += 1;
            if let Some(fail_after) = state.fail_commit_after {
                if state.commit_count > fail_after {
                    return Err(DocumentStoreError::Unavailable(
                        "forced commit failure".to_string(),
                    ));
                }
            }
            if state.drop_deletes {
                let mut kept = WriteBatch::new();
                for op in batch.into_ops() {
                    if let WriteOp::Set {
                        collection,
                        id,
                        document,
                    } = op
                    {
                        kept.set(collection, id, document);
                    }
                }
                kept
            } else {
                batch
            }
        };
        self.inner.commit(batch).await?;
        self.state.lock().unwrap().committed_batch_sizes.push(size);
        Ok(())
    }
}
