//! The backend-agnostic repository contract.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::types::{
    Diagnosis, DiagnosisSummary, NewDiagnosis, NewPatient, NewProfessional, Patient,
    Professional, ReferenceEntity, ReferenceKind, WipeReport,
};

use super::BackendKind;

/// Persistence contract for diagnostic aggregates.
///
/// Implemented by the relational and the document backend. Every operation
/// either returns a value or fails with a [`StorageError`](crate::StorageError);
/// a point lookup that does not resolve returns `None`, never an error.
///
/// # Example
///
/// ```ignore
/// use diagnovet_persistence::core::DiagnosisRepository;
///
/// async fn show<R: DiagnosisRepository>(repo: &R, id: &str) -> StorageResult<()> {
///     match repo.get_diagnosis(id).await? {
///         Some(diagnosis) => println!("{}: {}", diagnosis.patient.name, diagnosis.diagnosis),
///         None => println!("no diagnosis {}", id),
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait DiagnosisRepository: Send + Sync {
    /// Returns which storage model this repository uses.
    fn backend_kind(&self) -> BackendKind;

    /// Persists a whole aggregate and returns the new report id.
    ///
    /// Reference entities are resolved by natural key; the patient is always
    /// new. Either the whole aggregate becomes visible or none of it does,
    /// within the atomicity bound of the backend.
    ///
    /// # Errors
    ///
    /// * `StorageError::Validation` - blank diagnosis or missing/invalid date
    /// * `StorageError::Transaction` - the write could not be applied atomically
    /// * `StorageError::Backend` - the store rejected the write
    async fn create_diagnosis(&self, diagnosis: &NewDiagnosis) -> StorageResult<String>;

    /// Loads and reconstructs an aggregate.
    async fn get_diagnosis(&self, id: &str) -> StorageResult<Option<Diagnosis>>;

    /// Lists summary projections ordered by report date, then id.
    async fn list_diagnosis_summaries(&self) -> StorageResult<Vec<DiagnosisSummary>>;

    /// Lists every stored patient.
    async fn list_patients(&self) -> StorageResult<Vec<Patient>>;

    /// Stores a standalone patient and returns its id.
    async fn create_patient(&self, patient: &NewPatient) -> StorageResult<String>;

    /// Loads a professional by id.
    async fn get_professional(&self, id: &str) -> StorageResult<Option<Professional>>;

    /// Stores a professional and returns its id.
    async fn create_professional(&self, professional: &NewProfessional) -> StorageResult<String>;

    /// Deletes a report together with its studies, measurements and
    /// observations. Returns `false` if the id did not resolve.
    async fn delete_diagnosis(&self, id: &str) -> StorageResult<bool>;

    /// Lists the reference entities of one kind, ordered by label.
    async fn list_reference_entities(
        &self,
        kind: ReferenceKind,
    ) -> StorageResult<Vec<ReferenceEntity>>;

    /// Removes all stored data. See [`WipeReport`] for partial outcomes.
    async fn wipe_all(&self) -> StorageResult<WipeReport>;

    /// Checks that the store is reachable.
    async fn health_check(&self) -> StorageResult<()>;
}
