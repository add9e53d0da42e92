//! Batch size limit and chunked writes.

use std::sync::Arc;

use super::store::{DocumentStore, DocumentStoreError, WriteBatch};

/// Maximum number of writes a single atomic commit may carry.
pub const MAX_BATCH_WRITES: usize = 500;

/// Stages deletes and commits them in batches of at most
/// [`MAX_BATCH_WRITES`].
///
/// Each flushed chunk is atomic on its own; the sequence of chunks is not.
/// After a failed flush, [`committed`](Self::committed) reports how many
/// deletes had already been applied.
pub struct ChunkedBatchWriter {
    store: Arc<dyn DocumentStore>,
    pending: WriteBatch,
    committed: usize,
    chunks: usize,
}

impl ChunkedBatchWriter {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            pending: WriteBatch::new(),
            committed: 0,
            chunks: 0,
        }
    }

    /// Stages a delete, flushing first if the pending chunk is full.
    pub async fn delete(
        &mut self,
        collection: &'static str,
        id: impl Into<String>,
    ) -> Result<(), DocumentStoreError> {
        if self.pending.len() >= MAX_BATCH_WRITES {
            self.flush().await?;
        }
        self.pending.delete(collection, id);
        Ok(())
    }

    /// Commits the pending chunk, if any.
    pub async fn flush(&mut self) -> Result<(), DocumentStoreError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.pending);
        let size = batch.len();
        self.store.commit(batch).await?;
        self.committed += size;
        self.chunks += 1;
        tracing::debug!(size, chunks = self.chunks, "Committed delete chunk");
        Ok(())
    }

    /// Writes applied so far.
    pub fn committed(&self) -> usize {
        self.committed
    }

    /// Chunks committed so far.
    pub fn chunks(&self) -> usize {
        self.chunks
    }
}
