//! Core types for the persistence layer.
//!
//! - [`NewDiagnosis`] and friends - an aggregate as it arrives for writing
//! - [`Diagnosis`] and friends - an aggregate reconstructed from storage
//! - [`DiagnosisSummary`] - the list-view projection
//! - [`ReferenceKind`], [`ReferenceEntity`] - deduplicated lookup entities
//! - [`WipeReport`] - outcome of a store-wide wipe
//!
//! # Example
//!
//! ```
//! use diagnovet_persistence::types::{DiagnosisText, NewReport};
//!
//! let report = NewReport {
//!     history: None,
//!     diagnosis: Some(DiagnosisText::Items(vec![
//!         "Cardiomegaly".to_string(),
//!         "Mild effusion".to_string(),
//!     ])),
//!     image_folder: None,
//!     date: Some("01/02/2024".to_string()),
//!     studies: vec![],
//! };
//!
//! let prepared = report.prepare().unwrap();
//! assert_eq!(prepared.diagnosis, "Cardiomegaly; Mild effusion");
//! assert_eq!(prepared.date.to_string(), "2024-02-01");
//! ```

mod aggregate;
pub mod date;
mod reference;
mod wipe;

pub use aggregate::{
    value_from_text, value_to_text, Diagnosis, DiagnosisSummary, DiagnosisText, Measurement,
    NewDiagnosis, NewMeasurement, NewObservation, NewPatient, NewProfessional, NewReport,
    NewStudy, Observation, Patient, PreparedReport, Professional, Study, DIAGNOSIS_SEPARATOR,
};
pub(crate) use aggregate::sort_summaries;
pub use reference::{ReferenceEntity, ReferenceKind};
pub use wipe::{WipeFailure, WipeReport};
