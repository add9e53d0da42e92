//! Document implementation of the repository.
//!
//! Each aggregate entity is its own document in a flat collection and
//! references other documents by id. A new aggregate is staged into one
//! [`WriteBatch`] and committed atomically, which bounds aggregate size to
//! [`MAX_BATCH_WRITES`]. Reference entities are resolved by querying their
//! `label` field before the batch is built; professionals are always new.
//!
//! Store clients plug in through [`DocumentStore`]:
//!
//! | Store | Feature | Notes |
//! |-------|---------|-------|
//! | [`MemoryDocumentStore`] | always | In-process, used by tests and local runs |
//! | `MongoDocumentStore` | `mongodb` | Needs a replica set for transactions |
//!
//! # Example
//!
//! ```
//! use diagnovet_persistence::backends::document::DocumentBackend;
//! use diagnovet_persistence::core::{BackendKind, DiagnosisRepository};
//!
//! let backend = DocumentBackend::in_memory();
//! assert_eq!(backend.backend_kind(), BackendKind::Document);
//! ```

mod backend;
mod batch;
mod documents;
mod memory;
#[cfg(feature = "mongodb")]
mod mongo;
mod storage;
mod store;

pub use backend::DocumentBackend;
pub use batch::{ChunkedBatchWriter, MAX_BATCH_WRITES};
pub use documents::ALL_COLLECTIONS;
pub use memory::MemoryDocumentStore;
#[cfg(feature = "mongodb")]
pub use mongo::MongoDocumentStore;
pub use store::{
    Document, DocumentStore, DocumentStoreError, StoredDocument, WriteBatch, WriteOp,
};
