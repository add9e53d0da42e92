//! Core repository abstractions.
//!
//! - [`DiagnosisRepository`] - the operation set every backend implements
//! - [`BackendKind`] - which storage model backs a repository

pub mod backend;
pub mod repository;

pub use backend::BackendKind;
pub use repository::DiagnosisRepository;
