//! Diagnovet persistence layer
//!
//! This crate stores veterinary diagnostic reports as one aggregate: a report
//! with its patient, referring professional, studies, measurements and
//! observations, plus deduplicated reference entities (study types, organs,
//! units and measure types). The same [`DiagnosisRepository`] contract is
//! implemented by two storage models and selected from configuration.
//!
//! # Backends
//!
//! - **Relational** (`sqlite`, default) - normalized tables, foreign keys,
//!   one transaction per aggregate, cascading deletes
//! - **Document** - one document per entity with id references and an
//!   atomic batch per aggregate; in-process store always available, MongoDB
//!   behind the `mongodb` feature
//!
//! # Architecture
//!
//! - [`types`] - the aggregate, summaries, reference entities, wipe outcome
//! - [`error`] - error types for all operations
//! - [`core`] - the repository contract and backend identification
//! - [`config`] - repository configuration
//! - [`backends`] - relational and document implementations
//! - [`selector`] - builds the configured backend once and shares it
//!
//! # Quick Start
//!
//! ```
//! use diagnovet_persistence::core::DiagnosisRepository;
//! use diagnovet_persistence::types::NewDiagnosis;
//! use diagnovet_persistence::{RepositoryConfig, RepositorySelector, StorageError};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let diagnosis: NewDiagnosis = serde_json::from_value(json!({
//!     "paciente": {"nombre": "Rex", "tutor": "Ana"},
//!     "veterinario": {"nombre": "Juan", "apellido": "Perez"},
//!     "informe": {
//!         "diagnostico": "Healthy",
//!         "fecha": "01/02/2024",
//!         "estudios": [{
//!             "tipo_estudio": "X-ray",
//!             "observaciones": [{"organo": "Heart", "observacion": "Normal"}]
//!         }]
//!     }
//! }))?;
//!
//! let runtime = tokio::runtime::Runtime::new()?;
//! runtime.block_on(async {
//!     let selector = RepositorySelector::new(RepositoryConfig::document_in_memory());
//!     let repository = selector.repository().await?;
//!
//!     let id = repository.create_diagnosis(&diagnosis).await?;
//!     let stored = repository.get_diagnosis(&id).await?;
//!     assert_eq!(stored.map(|d| d.patient.name), Some("Rex".to_string()));
//!     Ok::<_, StorageError>(())
//! })?;
//! # Ok(())
//! # }
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod config;
pub mod core;
pub mod error;
pub mod selector;
pub mod types;

// Re-export commonly used types at crate root
pub use config::RepositoryConfig;
pub use core::{BackendKind, DiagnosisRepository};
pub use error::{StorageError, StorageResult};
pub use selector::{AnyRepository, RepositorySelector, SharedRepository};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
