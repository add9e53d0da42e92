//! Collection names and document shapes.
//!
//! Entity fields keep the names the aggregate serializes with. Relations are
//! stored as `*_id` fields holding the referenced document id, and the label
//! of each referenced entity is copied next to its id so a report can be read
//! back without resolving every reference.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StorageError, StorageResult};
use crate::types::ReferenceKind;

use super::store::{Document, StoredDocument};

pub const PATIENTS: &str = "patients";
pub const PROFESSIONALS: &str = "professionals";
pub const DIAGNOSES: &str = "diagnoses";
pub const STUDIES: &str = "studies";
pub const MEASUREMENTS: &str = "measurements";
pub const OBSERVATIONS: &str = "observations";
pub const STUDY_TYPES: &str = "study_types";
pub const ORGANS: &str = "organs";
pub const UNITS: &str = "units";
pub const MEASURE_TYPES: &str = "measure_types";

/// Collections in wipe order, children first.
pub const ALL_COLLECTIONS: &[&str] = &[
    OBSERVATIONS,
    MEASUREMENTS,
    STUDIES,
    DIAGNOSES,
    PATIENTS,
    PROFESSIONALS,
    STUDY_TYPES,
    ORGANS,
    UNITS,
    MEASURE_TYPES,
];

pub const LABEL_FIELD: &str = "label";
pub const DIAGNOSIS_ID_FIELD: &str = "diagnosis_id";
pub const STUDY_ID_FIELD: &str = "study_id";

pub fn reference_collection(kind: ReferenceKind) -> &'static str {
    match kind {
        ReferenceKind::StudyType => STUDY_TYPES,
        ReferenceKind::Organ => ORGANS,
        ReferenceKind::Unit => UNITS,
        ReferenceKind::MeasureType => MEASURE_TYPES,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDoc {
    #[serde(rename = "antecedentes", default)]
    pub history: Option<String>,
    #[serde(rename = "diagnostico", default)]
    pub diagnosis: String,
    #[serde(rename = "img_folder", default)]
    pub image_folder: Option<String>,
    /// ISO date on write; older documents may hold a timestamp.
    #[serde(rename = "fecha", default)]
    pub date: Value,
    pub patient_id: String,
    pub professional_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyDoc {
    pub diagnosis_id: String,
    pub study_type_id: String,
    #[serde(rename = "tipo_estudio", default)]
    pub study_type: Option<String>,
    #[serde(default)]
    pub position: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementDoc {
    pub study_id: String,
    pub measure_type_id: String,
    #[serde(rename = "tipo_medicion", default)]
    pub kind: Option<String>,
    pub organ_id: String,
    #[serde(rename = "organo", default)]
    pub organ: Option<String>,
    #[serde(default)]
    pub unit_id: Option<String>,
    #[serde(rename = "unidad", default)]
    pub unit: Option<String>,
    /// Text on write; numbers written by other producers are accepted.
    #[serde(rename = "valor", default)]
    pub value: Value,
    #[serde(default)]
    pub position: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationDoc {
    pub study_id: String,
    pub organ_id: String,
    #[serde(rename = "organo", default)]
    pub organ: Option<String>,
    #[serde(rename = "observacion", default)]
    pub note: String,
    #[serde(default)]
    pub position: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceDoc {
    pub label: String,
}

/// Serializes a value into a document body.
pub fn to_document<T: Serialize>(value: &T) -> StorageResult<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StorageError::internal(
            "document",
            format!("expected an object, serialized {}", other),
        )),
    }
}

/// Deserializes a stored document body.
pub fn from_document<T: DeserializeOwned>(doc: &StoredDocument) -> StorageResult<T> {
    Ok(serde_json::from_value(Value::Object(doc.data.clone()))?)
}
