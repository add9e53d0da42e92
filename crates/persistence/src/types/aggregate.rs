//! The diagnostic aggregate.
//!
//! Write-side types (`New*`) carry what upstream producers send; read-side
//! types carry the identifiers assigned by storage. Both serialize with the
//! field names the extraction pipeline and the frontend use.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

use super::date::parse_report_date;

/// Separator used when a diagnosis arrives as a list of findings.
pub const DIAGNOSIS_SEPARATOR: &str = "; ";

/// Diagnosis text as supplied upstream: either one string or a list of
/// findings that is stored joined with [`DIAGNOSIS_SEPARATOR`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiagnosisText {
    Text(String),
    Items(Vec<String>),
}

impl DiagnosisText {
    /// Returns the single string that gets persisted.
    ///
    /// List items are trimmed and blank items dropped before joining.
    pub fn joined(&self) -> String {
        match self {
            DiagnosisText::Text(text) => text.clone(),
            DiagnosisText::Items(items) => items
                .iter()
                .map(|item| item.trim())
                .filter(|item| !item.is_empty())
                .collect::<Vec<_>>()
                .join(DIAGNOSIS_SEPARATOR),
        }
    }
}

impl From<&str> for DiagnosisText {
    fn from(text: &str) -> Self {
        DiagnosisText::Text(text.to_string())
    }
}

impl From<String> for DiagnosisText {
    fn from(text: String) -> Self {
        DiagnosisText::Text(text)
    }
}

impl From<Vec<String>> for DiagnosisText {
    fn from(items: Vec<String>) -> Self {
        DiagnosisText::Items(items)
    }
}

/// Patient fields for a new aggregate or a standalone patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPatient {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "tutor")]
    pub guardian: String,
    #[serde(rename = "edad", default)]
    pub age: Option<String>,
    #[serde(rename = "raza", default)]
    pub breed: Option<String>,
}

/// Referring professional fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProfessional {
    #[serde(rename = "nombre")]
    pub first_name: String,
    #[serde(rename = "apellido")]
    pub last_name: String,
    #[serde(rename = "matricula", default)]
    pub license: Option<i64>,
}

/// A single measurement inside a study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMeasurement {
    #[serde(rename = "tipo_medicion")]
    pub kind: String,
    #[serde(rename = "valor", default)]
    pub value: Option<f64>,
    #[serde(rename = "unidad", default)]
    pub unit: Option<String>,
    #[serde(rename = "organo")]
    pub organ: String,
}

/// A free-text observation about an organ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewObservation {
    #[serde(rename = "organo")]
    pub organ: String,
    #[serde(rename = "observacion")]
    pub note: String,
}

/// A study with its measurements and observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStudy {
    #[serde(rename = "tipo_estudio")]
    pub study_type: String,
    #[serde(rename = "mediciones", default)]
    pub measurements: Vec<NewMeasurement>,
    #[serde(rename = "observaciones", default)]
    pub observations: Vec<NewObservation>,
}

/// The report part of a new aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReport {
    #[serde(rename = "antecedentes", default)]
    pub history: Option<String>,
    #[serde(rename = "diagnostico", default)]
    pub diagnosis: Option<DiagnosisText>,
    #[serde(rename = "img_folder", default)]
    pub image_folder: Option<String>,
    /// `DD/MM/YYYY` as sent upstream; ISO dates are also accepted.
    #[serde(rename = "fecha", default)]
    pub date: Option<String>,
    #[serde(rename = "estudios", default)]
    pub studies: Vec<NewStudy>,
}

/// A complete diagnostic aggregate ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDiagnosis {
    #[serde(rename = "paciente")]
    pub patient: NewPatient,
    #[serde(rename = "veterinario")]
    pub professional: NewProfessional,
    #[serde(rename = "informe")]
    pub report: NewReport,
}

/// Report fields after the invariants of this layer have been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedReport {
    pub history: Option<String>,
    pub diagnosis: String,
    pub image_folder: Option<String>,
    pub date: NaiveDate,
}

impl NewReport {
    /// Checks the report invariants: a non-blank diagnosis and a parseable date.
    pub fn prepare(&self) -> Result<PreparedReport, ValidationError> {
        let diagnosis = self
            .diagnosis
            .as_ref()
            .map(DiagnosisText::joined)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ValidationError::MissingRequiredField {
                field: "diagnostico".to_string(),
            })?;

        let raw_date = self
            .date
            .as_deref()
            .filter(|date| !date.trim().is_empty())
            .ok_or_else(|| ValidationError::MissingRequiredField {
                field: "fecha".to_string(),
            })?;

        Ok(PreparedReport {
            history: self.history.clone(),
            diagnosis,
            image_folder: self.image_folder.clone(),
            date: parse_report_date(raw_date)?,
        })
    }
}

impl NewDiagnosis {
    /// Number of entity rows/documents this aggregate produces, excluding
    /// reference entities.
    pub fn entity_count(&self) -> usize {
        3 + self
            .report
            .studies
            .iter()
            .map(|study| 1 + study.measurements.len() + study.observations.len())
            .sum::<usize>()
    }
}

impl NewMeasurement {
    /// The value as persisted text, if present.
    pub fn value_text(&self) -> Option<String> {
        self.value.map(value_to_text)
    }
}

/// Renders a measurement value as text.
pub fn value_to_text(value: f64) -> String {
    value.to_string()
}

/// Parses a persisted measurement value, tolerating a decimal comma.
pub fn value_from_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    trimmed
        .parse::<f64>()
        .or_else(|_| trimmed.replace(',', ".").parse::<f64>())
        .ok()
}

/// A stored patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "tutor")]
    pub guardian: String,
    #[serde(rename = "edad")]
    pub age: Option<String>,
    #[serde(rename = "raza")]
    pub breed: Option<String>,
}

/// A stored professional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Professional {
    pub id: String,
    #[serde(rename = "nombre")]
    pub first_name: String,
    #[serde(rename = "apellido")]
    pub last_name: String,
    #[serde(rename = "matricula")]
    pub license: Option<i64>,
}

/// A stored measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: String,
    #[serde(rename = "tipo_medicion")]
    pub kind: String,
    #[serde(rename = "valor")]
    pub value: Option<f64>,
    #[serde(rename = "organo")]
    pub organ: String,
    #[serde(rename = "unidad")]
    pub unit: Option<String>,
}

/// A stored observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    #[serde(rename = "observacion")]
    pub note: String,
    #[serde(rename = "organo")]
    pub organ: String,
}

/// A stored study with its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Study {
    pub id: String,
    #[serde(rename = "tipo_estudio")]
    pub study_type: String,
    #[serde(rename = "mediciones")]
    pub measurements: Vec<Measurement>,
    #[serde(rename = "observaciones")]
    pub observations: Vec<Observation>,
}

/// A fully reconstructed diagnostic aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub id: String,
    #[serde(rename = "antecedentes")]
    pub history: Option<String>,
    #[serde(rename = "diagnostico")]
    pub diagnosis: String,
    #[serde(rename = "fecha")]
    pub date: NaiveDate,
    #[serde(rename = "img_folder")]
    pub image_folder: Option<String>,
    #[serde(rename = "paciente")]
    pub patient: Patient,
    #[serde(rename = "veterinario")]
    pub professional: Professional,
    #[serde(rename = "estudios")]
    pub studies: Vec<Study>,
}

/// Summary projection of a diagnosis for list views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisSummary {
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "tutor")]
    pub guardian: String,
    #[serde(rename = "edad")]
    pub age: Option<String>,
    #[serde(rename = "raza")]
    pub breed: Option<String>,
    #[serde(rename = "fecha")]
    pub date: NaiveDate,
}

/// Sorts summaries by date, then id.
pub(crate) fn sort_summaries(summaries: &mut [DiagnosisSummary]) {
    summaries.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
}
