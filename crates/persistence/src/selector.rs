//! Configuration-driven repository selection.
//!
//! A [`RepositorySelector`] builds exactly one backend from a
//! [`RepositoryConfig`] the first time a repository is requested and hands
//! out the same instance afterwards. The built backend is an
//! [`AnyRepository`]: one of the two storage models, fixed at construction.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::backends::document::DocumentBackend;
#[cfg(feature = "sqlite")]
use crate::backends::sqlite::SqliteBackend;
use crate::config::{DocumentStoreKind, RepositoryConfig};
use crate::core::{BackendKind, DiagnosisRepository};
use crate::error::{BackendError, StorageResult};
use crate::types::{
    Diagnosis, DiagnosisSummary, NewDiagnosis, NewPatient, NewProfessional, Patient,
    Professional, ReferenceEntity, ReferenceKind, WipeReport,
};

/// Shared handle to the selected repository.
pub type SharedRepository = Arc<AnyRepository>;

/// The repository chosen from configuration.
#[derive(Debug)]
pub enum AnyRepository {
    /// SQLite, normalized tables.
    #[cfg(feature = "sqlite")]
    Relational(SqliteBackend),
    /// One document per entity over a [`DocumentStore`](crate::backends::document::DocumentStore).
    Document(DocumentBackend),
}

macro_rules! dispatch {
    ($self:ident, $repo:ident => $call:expr) => {
        match $self {
            #[cfg(feature = "sqlite")]
            AnyRepository::Relational($repo) => $call,
            AnyRepository::Document($repo) => $call,
        }
    };
}

#[async_trait]
impl DiagnosisRepository for AnyRepository {
    fn backend_kind(&self) -> BackendKind {
        dispatch!(self, repo => repo.backend_kind())
    }

    async fn create_diagnosis(&self, diagnosis: &NewDiagnosis) -> StorageResult<String> {
        dispatch!(self, repo => repo.create_diagnosis(diagnosis).await)
    }

    async fn get_diagnosis(&self, id: &str) -> StorageResult<Option<Diagnosis>> {
        dispatch!(self, repo => repo.get_diagnosis(id).await)
    }

    async fn list_diagnosis_summaries(&self) -> StorageResult<Vec<DiagnosisSummary>> {
        dispatch!(self, repo => repo.list_diagnosis_summaries().await)
    }

    async fn list_patients(&self) -> StorageResult<Vec<Patient>> {
        dispatch!(self, repo => repo.list_patients().await)
    }

    async fn create_patient(&self, patient: &NewPatient) -> StorageResult<String> {
        dispatch!(self, repo => repo.create_patient(patient).await)
    }

    async fn get_professional(&self, id: &str) -> StorageResult<Option<Professional>> {
        dispatch!(self, repo => repo.get_professional(id).await)
    }

    async fn create_professional(&self, professional: &NewProfessional) -> StorageResult<String> {
        dispatch!(self, repo => repo.create_professional(professional).await)
    }

    async fn delete_diagnosis(&self, id: &str) -> StorageResult<bool> {
        dispatch!(self, repo => repo.delete_diagnosis(id).await)
    }

    async fn list_reference_entities(
        &self,
        kind: ReferenceKind,
    ) -> StorageResult<Vec<ReferenceEntity>> {
        dispatch!(self, repo => repo.list_reference_entities(kind).await)
    }

    async fn wipe_all(&self) -> StorageResult<WipeReport> {
        dispatch!(self, repo => repo.wipe_all().await)
    }

    async fn health_check(&self) -> StorageResult<()> {
        dispatch!(self, repo => repo.health_check().await)
    }
}

/// Lazily constructs and caches the configured repository.
///
/// Construction failures are returned to the caller and not cached; the next
/// call retries. There is no fallback to another backend.
pub struct RepositorySelector {
    config: RepositoryConfig,
    repository: OnceCell<SharedRepository>,
}

impl RepositorySelector {
    pub fn new(config: RepositoryConfig) -> Self {
        Self {
            config,
            repository: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// The backend kind this selector builds.
    pub fn backend_kind(&self) -> BackendKind {
        self.config.backend
    }

    /// Whether a repository has been constructed.
    pub fn is_initialized(&self) -> bool {
        self.repository.initialized()
    }

    /// Returns the repository, constructing it on first use.
    ///
    /// Concurrent first calls construct the backend once.
    pub async fn repository(&self) -> StorageResult<SharedRepository> {
        self.repository
            .get_or_try_init(|| async { build_repository(&self.config).await.map(Arc::new) })
            .await
            .cloned()
    }
}

/// Builds the backend named by `config`.
pub async fn build_repository(config: &RepositoryConfig) -> StorageResult<AnyRepository> {
    tracing::info!(backend = %config.backend, "Selecting repository backend");
    match config.backend {
        BackendKind::Relational => build_relational(config),
        BackendKind::Document => build_document(config).await,
    }
}

#[cfg(feature = "sqlite")]
fn build_relational(config: &RepositoryConfig) -> StorageResult<AnyRepository> {
    let backend = SqliteBackend::with_config(config.sqlite.clone())?;
    backend.init_schema()?;
    Ok(AnyRepository::Relational(backend))
}

#[cfg(not(feature = "sqlite"))]
fn build_relational(_config: &RepositoryConfig) -> StorageResult<AnyRepository> {
    Err(BackendError::FeatureDisabled {
        backend_name: "sqlite".to_string(),
        feature: "sqlite".to_string(),
    }
    .into())
}

async fn build_document(config: &RepositoryConfig) -> StorageResult<AnyRepository> {
    let backend = match config.document.store {
        DocumentStoreKind::Memory => DocumentBackend::in_memory(),
        DocumentStoreKind::MongoDb => {
            let uri = config
                .document
                .mongodb_uri
                .as_deref()
                .map(str::trim)
                .filter(|uri| !uri.is_empty())
                .ok_or_else(|| BackendError::NotConfigured {
                    backend_name: "mongodb".to_string(),
                    parameter: "mongodb_uri".to_string(),
                })?;
            connect_mongodb(uri, &config.document.mongodb_database).await?
        }
    };
    Ok(AnyRepository::Document(backend))
}

#[cfg(feature = "mongodb")]
async fn connect_mongodb(uri: &str, database: &str) -> StorageResult<DocumentBackend> {
    DocumentBackend::connect_mongodb(uri, database).await
}

#[cfg(not(feature = "mongodb"))]
async fn connect_mongodb(_uri: &str, _database: &str) -> StorageResult<DocumentBackend> {
    Err(BackendError::FeatureDisabled {
        backend_name: "mongodb".to_string(),
        feature: "mongodb".to_string(),
    }
    .into())
}
