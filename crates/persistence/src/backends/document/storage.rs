//! DiagnosisRepository implementation for document stores.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::{BackendKind, DiagnosisRepository};
use crate::error::{StorageError, StorageResult, TransactionError};
use crate::types::date::{format_iso_date, normalize_stored_date};
use crate::types::{
    sort_summaries, value_from_text, Diagnosis, DiagnosisSummary, Measurement, NewDiagnosis,
    NewPatient, NewProfessional, Observation, Patient, Professional, ReferenceEntity,
    ReferenceKind, Study, WipeFailure, WipeReport,
};

use super::batch::{ChunkedBatchWriter, MAX_BATCH_WRITES};
use super::documents::{
    from_document, reference_collection, to_document, MeasurementDoc, ObservationDoc,
    ReferenceDoc, ReportDoc, StudyDoc, ALL_COLLECTIONS, DIAGNOSES, DIAGNOSIS_ID_FIELD,
    LABEL_FIELD, MEASUREMENTS, OBSERVATIONS, PATIENTS, PROFESSIONALS, STUDIES, STUDY_ID_FIELD,
};
use super::store::{StoredDocument, WriteBatch};
use super::DocumentBackend;

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn patient_from(doc: &StoredDocument) -> StorageResult<Patient> {
    let fields: NewPatient = from_document(doc)?;
    Ok(Patient {
        id: doc.id.clone(),
        name: fields.name,
        guardian: fields.guardian,
        age: fields.age,
        breed: fields.breed,
    })
}

fn professional_from(doc: &StoredDocument) -> StorageResult<Professional> {
    let fields: NewProfessional = from_document(doc)?;
    Ok(Professional {
        id: doc.id.clone(),
        first_name: fields.first_name,
        last_name: fields.last_name,
        license: fields.license,
    })
}

/// Reads a stored measurement value; anything not numeric reads as absent.
fn read_value(measurement_id: &str, value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Null => return None,
        Value::Number(number) => number.as_f64(),
        Value::String(text) => value_from_text(text),
        _ => None,
    };
    if parsed.is_none() {
        tracing::warn!(
            measurement_id,
            value = %value,
            "Stored measurement value is not numeric; reading as absent"
        );
    }
    parsed
}

trait HasPosition {
    fn position(&self) -> usize;
}

impl HasPosition for StudyDoc {
    fn position(&self) -> usize {
        self.position
    }
}

impl HasPosition for MeasurementDoc {
    fn position(&self) -> usize {
        self.position
    }
}

impl HasPosition for ObservationDoc {
    fn position(&self) -> usize {
        self.position
    }
}

/// Reference ids resolved while staging one aggregate.
type LabelCache = HashMap<(ReferenceKind, String), String>;

impl DocumentBackend {
    /// Resolves a reference label to a document id, staging a new reference
    /// document when none exists yet.
    async fn resolve_reference(
        &self,
        batch: &mut WriteBatch,
        cache: &mut LabelCache,
        kind: ReferenceKind,
        label: &str,
    ) -> StorageResult<String> {
        let key = (kind, label.to_string());
        if let Some(id) = cache.get(&key) {
            return Ok(id.clone());
        }

        let collection = reference_collection(kind);
        let existing = self
            .store()
            .find_by_field(collection, LABEL_FIELD, &Value::String(label.to_string()))
            .await?;

        let id = match existing.into_iter().next() {
            Some(doc) => doc.id,
            None => {
                let id = new_id();
                batch.set(
                    collection,
                    id.clone(),
                    to_document(&ReferenceDoc {
                        label: label.to_string(),
                    })?,
                );
                tracing::debug!(kind = %kind, label, "Staged reference entity");
                id
            }
        };

        cache.insert(key, id.clone());
        Ok(id)
    }

    /// Label of a reference, preferring the copy stored next to its id.
    async fn reference_label(
        &self,
        kind: ReferenceKind,
        copied: Option<String>,
        id: &str,
    ) -> StorageResult<String> {
        if let Some(label) = copied {
            return Ok(label);
        }
        match self.store().get(reference_collection(kind), id).await? {
            Some(doc) => Ok(from_document::<ReferenceDoc>(&doc)?.label),
            None => {
                tracing::warn!(kind = %kind, id, "Dangling reference");
                Ok(String::new())
            }
        }
    }

    /// Documents of `collection` whose `parent_field` holds `parent_id`,
    /// ordered by their position under the parent.
    async fn children<T: DeserializeOwned + Send + HasPosition>(
        &self,
        collection: &str,
        parent_field: &str,
        parent_id: &str,
    ) -> StorageResult<Vec<(String, T)>> {
        let mut children = self
            .store()
            .find_by_field(collection, parent_field, &Value::String(parent_id.to_string()))
            .await?
            .iter()
            .map(|doc| -> StorageResult<(String, T)> { Ok((doc.id.clone(), from_document(doc)?)) })
            .collect::<StorageResult<Vec<_>>>()?;
        children.sort_by(|a, b| {
            a.1.position()
                .cmp(&b.1.position())
                .then_with(|| a.0.cmp(&b.0))
        });
        Ok(children)
    }

    /// Deletes every document of `collection`, one listing at a time.
    ///
    /// Fails when a listing returns an id the previous pass already deleted,
    /// since the store is then not applying the deletes.
    async fn clear_collection(
        &self,
        writer: &mut ChunkedBatchWriter,
        collection: &'static str,
    ) -> StorageResult<()> {
        let mut deleted: HashSet<String> = HashSet::new();
        loop {
            let ids = self.store().list_ids(collection, MAX_BATCH_WRITES).await?;
            if ids.is_empty() {
                return Ok(());
            }
            if let Some(stuck) = ids.iter().find(|id| deleted.contains(*id)) {
                return Err(StorageError::internal(
                    self.store().store_name(),
                    format!(
                        "document {} in {} is still present after being deleted",
                        stuck, collection
                    ),
                ));
            }
            deleted.clear();
            for id in ids {
                deleted.insert(id.clone());
                writer.delete(collection, id).await?;
            }
            writer.flush().await?;
        }
    }
}

#[async_trait]
impl DiagnosisRepository for DocumentBackend {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Document
    }

    async fn create_diagnosis(&self, diagnosis: &NewDiagnosis) -> StorageResult<String> {
        let report = diagnosis.report.prepare()?;

        let entities = diagnosis.entity_count();
        if entities > MAX_BATCH_WRITES {
            return Err(TransactionError::BatchTooLarge {
                staged: entities,
                max: MAX_BATCH_WRITES,
            }
            .into());
        }

        let mut batch = WriteBatch::new();
        let mut labels = LabelCache::new();

        let patient_id = new_id();
        batch.set(PATIENTS, patient_id.clone(), to_document(&diagnosis.patient)?);

        let professional_id = new_id();
        batch.set(
            PROFESSIONALS,
            professional_id.clone(),
            to_document(&diagnosis.professional)?,
        );

        let diagnosis_id = new_id();
        batch.set(
            DIAGNOSES,
            diagnosis_id.clone(),
            to_document(&ReportDoc {
                history: report.history,
                diagnosis: report.diagnosis,
                image_folder: report.image_folder,
                date: Value::String(format_iso_date(report.date)),
                patient_id,
                professional_id,
            })?,
        );

        for (study_position, study) in diagnosis.report.studies.iter().enumerate() {
            let study_type_id = self
                .resolve_reference(
                    &mut batch,
                    &mut labels,
                    ReferenceKind::StudyType,
                    &study.study_type,
                )
                .await?;
            let study_id = new_id();
            batch.set(
                STUDIES,
                study_id.clone(),
                to_document(&StudyDoc {
                    diagnosis_id: diagnosis_id.clone(),
                    study_type_id,
                    study_type: Some(study.study_type.clone()),
                    position: study_position,
                })?,
            );

            for (position, measurement) in study.measurements.iter().enumerate() {
                let measure_type_id = self
                    .resolve_reference(
                        &mut batch,
                        &mut labels,
                        ReferenceKind::MeasureType,
                        &measurement.kind,
                    )
                    .await?;
                let organ_id = self
                    .resolve_reference(
                        &mut batch,
                        &mut labels,
                        ReferenceKind::Organ,
                        &measurement.organ,
                    )
                    .await?;
                let unit_id = match measurement.unit.as_deref() {
                    Some(unit) => Some(
                        self.resolve_reference(&mut batch, &mut labels, ReferenceKind::Unit, unit)
                            .await?,
                    ),
                    None => None,
                };
                batch.set(
                    MEASUREMENTS,
                    new_id(),
                    to_document(&MeasurementDoc {
                        study_id: study_id.clone(),
                        measure_type_id,
                        kind: Some(measurement.kind.clone()),
                        organ_id,
                        organ: Some(measurement.organ.clone()),
                        unit_id,
                        unit: measurement.unit.clone(),
                        value: measurement
                            .value_text()
                            .map(Value::String)
                            .unwrap_or(Value::Null),
                        position,
                    })?,
                );
            }

            for (position, observation) in study.observations.iter().enumerate() {
                let organ_id = self
                    .resolve_reference(
                        &mut batch,
                        &mut labels,
                        ReferenceKind::Organ,
                        &observation.organ,
                    )
                    .await?;
                batch.set(
                    OBSERVATIONS,
                    new_id(),
                    to_document(&ObservationDoc {
                        study_id: study_id.clone(),
                        organ_id,
                        organ: Some(observation.organ.clone()),
                        note: observation.note.clone(),
                        position,
                    })?,
                );
            }
        }

        // New reference documents count against the limit too.
        if batch.len() > MAX_BATCH_WRITES {
            return Err(TransactionError::BatchTooLarge {
                staged: batch.len(),
                max: MAX_BATCH_WRITES,
            }
            .into());
        }

        let staged = batch.len();
        self.store().commit(batch).await?;

        tracing::info!(
            diagnosis_id = %diagnosis_id,
            writes = staged,
            store = self.store().store_name(),
            "Created diagnosis"
        );
        Ok(diagnosis_id)
    }

    async fn get_diagnosis(&self, id: &str) -> StorageResult<Option<Diagnosis>> {
        let Some(report_doc) = self.store().get(DIAGNOSES, id).await? else {
            return Ok(None);
        };
        let report: ReportDoc = from_document(&report_doc)?;
        let date = normalize_stored_date(&report.date).ok_or_else(|| {
            StorageError::internal(
                self.store().store_name(),
                format!("diagnosis {} has unreadable date {}", id, report.date),
            )
        })?;

        let Some(patient_doc) = self.store().get(PATIENTS, &report.patient_id).await? else {
            tracing::warn!(diagnosis_id = id, patient_id = %report.patient_id, "Diagnosis references a missing patient");
            return Ok(None);
        };
        let Some(professional_doc) = self
            .store()
            .get(PROFESSIONALS, &report.professional_id)
            .await?
        else {
            tracing::warn!(diagnosis_id = id, professional_id = %report.professional_id, "Diagnosis references a missing professional");
            return Ok(None);
        };

        let study_docs: Vec<(String, StudyDoc)> =
            self.children(STUDIES, DIAGNOSIS_ID_FIELD, id).await?;

        let mut studies = Vec::with_capacity(study_docs.len());
        for (study_id, doc) in study_docs {
            let study_type = self
                .reference_label(ReferenceKind::StudyType, doc.study_type, &doc.study_type_id)
                .await?;

            let mut measurements = Vec::new();
            let measurement_docs: Vec<(String, MeasurementDoc)> =
                self.children(MEASUREMENTS, STUDY_ID_FIELD, &study_id).await?;
            for (measurement_id, doc) in measurement_docs {
                let kind = self
                    .reference_label(ReferenceKind::MeasureType, doc.kind, &doc.measure_type_id)
                    .await?;
                let organ = self
                    .reference_label(ReferenceKind::Organ, doc.organ, &doc.organ_id)
                    .await?;
                let unit = match (doc.unit, doc.unit_id) {
                    (Some(unit), _) => Some(unit),
                    (None, Some(unit_id)) => Some(
                        self.reference_label(ReferenceKind::Unit, None, &unit_id)
                            .await?,
                    ),
                    (None, None) => None,
                };
                let value = read_value(&measurement_id, &doc.value);
                measurements.push(Measurement {
                    id: measurement_id,
                    kind,
                    value,
                    organ,
                    unit,
                });
            }

            let mut observations = Vec::new();
            let observation_docs: Vec<(String, ObservationDoc)> =
                self.children(OBSERVATIONS, STUDY_ID_FIELD, &study_id).await?;
            for (observation_id, doc) in observation_docs {
                let organ = self
                    .reference_label(ReferenceKind::Organ, doc.organ, &doc.organ_id)
                    .await?;
                observations.push(Observation {
                    id: observation_id,
                    note: doc.note,
                    organ,
                });
            }

            studies.push(Study {
                id: study_id,
                study_type,
                measurements,
                observations,
            });
        }

        Ok(Some(Diagnosis {
            id: id.to_string(),
            history: report.history,
            diagnosis: report.diagnosis,
            date,
            image_folder: report.image_folder,
            patient: patient_from(&patient_doc)?,
            professional: professional_from(&professional_doc)?,
            studies,
        }))
    }

    async fn list_diagnosis_summaries(&self) -> StorageResult<Vec<DiagnosisSummary>> {
        // Patients are point-read once each; several reports may share one.
        let mut patients: HashMap<String, Option<Patient>> = HashMap::new();

        let mut summaries = Vec::new();
        for doc in self.store().list(DIAGNOSES).await? {
            let report: ReportDoc = from_document(&doc)?;
            if !patients.contains_key(&report.patient_id) {
                let patient = match self.store().get(PATIENTS, &report.patient_id).await? {
                    Some(patient_doc) => Some(patient_from(&patient_doc)?),
                    None => None,
                };
                patients.insert(report.patient_id.clone(), patient);
            }
            let Some(Some(patient)) = patients.get(&report.patient_id) else {
                tracing::warn!(diagnosis_id = %doc.id, patient_id = %report.patient_id, "Skipping diagnosis with missing patient");
                continue;
            };
            let Some(date) = normalize_stored_date(&report.date) else {
                tracing::warn!(diagnosis_id = %doc.id, date = %report.date, "Skipping diagnosis with unreadable date");
                continue;
            };
            summaries.push(DiagnosisSummary {
                id: doc.id,
                name: patient.name.clone(),
                guardian: patient.guardian.clone(),
                age: patient.age.clone(),
                breed: patient.breed.clone(),
                date,
            });
        }

        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    async fn list_patients(&self) -> StorageResult<Vec<Patient>> {
        self.store()
            .list(PATIENTS)
            .await?
            .iter()
            .map(patient_from)
            .collect()
    }

    async fn create_patient(&self, patient: &NewPatient) -> StorageResult<String> {
        let id = new_id();
        let mut batch = WriteBatch::new();
        batch.set(PATIENTS, id.clone(), to_document(patient)?);
        self.store().commit(batch).await?;
        tracing::debug!(patient_id = %id, "Created patient");
        Ok(id)
    }

    async fn get_professional(&self, id: &str) -> StorageResult<Option<Professional>> {
        self.store()
            .get(PROFESSIONALS, id)
            .await?
            .map(|doc| professional_from(&doc))
            .transpose()
    }

    async fn create_professional(&self, professional: &NewProfessional) -> StorageResult<String> {
        // Professionals are not deduplicated in document stores.
        let id = new_id();
        let mut batch = WriteBatch::new();
        batch.set(PROFESSIONALS, id.clone(), to_document(professional)?);
        self.store().commit(batch).await?;
        Ok(id)
    }

    async fn delete_diagnosis(&self, id: &str) -> StorageResult<bool> {
        if self.store().get(DIAGNOSES, id).await?.is_none() {
            return Ok(false);
        }

        let mut targets: Vec<(&'static str, String)> = Vec::new();
        let studies = self
            .store()
            .find_by_field(STUDIES, DIAGNOSIS_ID_FIELD, &Value::String(id.to_string()))
            .await?;
        for study in &studies {
            let study_id = Value::String(study.id.clone());
            for collection in [OBSERVATIONS, MEASUREMENTS] {
                for doc in self
                    .store()
                    .find_by_field(collection, STUDY_ID_FIELD, &study_id)
                    .await?
                {
                    targets.push((collection, doc.id));
                }
            }
        }
        for study in studies {
            targets.push((STUDIES, study.id));
        }
        // The report goes last so an interrupted delete can be retried.
        targets.push((DIAGNOSES, id.to_string()));

        if targets.len() <= MAX_BATCH_WRITES {
            let mut batch = WriteBatch::new();
            for (collection, doc_id) in targets {
                batch.delete(collection, doc_id);
            }
            self.store().commit(batch).await?;
        } else {
            let mut writer = ChunkedBatchWriter::new(self.store().clone());
            for (collection, doc_id) in targets {
                writer.delete(collection, doc_id).await?;
            }
            writer.flush().await?;
        }

        tracing::info!(diagnosis_id = id, "Deleted diagnosis");
        Ok(true)
    }

    async fn list_reference_entities(
        &self,
        kind: ReferenceKind,
    ) -> StorageResult<Vec<ReferenceEntity>> {
        let mut entities = self
            .store()
            .list(reference_collection(kind))
            .await?
            .iter()
            .map(|doc| -> StorageResult<ReferenceEntity> {
                Ok(ReferenceEntity {
                    id: doc.id.clone(),
                    label: from_document::<ReferenceDoc>(doc)?.label,
                })
            })
            .collect::<StorageResult<Vec<_>>>()?;
        entities.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.id.cmp(&b.id)));
        Ok(entities)
    }

    async fn wipe_all(&self) -> StorageResult<WipeReport> {
        let mut report = WipeReport::default();
        let mut writer = ChunkedBatchWriter::new(self.store().clone());

        for &collection in ALL_COLLECTIONS {
            if let Err(e) = self.clear_collection(&mut writer, collection).await {
                report.deleted = writer.committed();
                tracing::error!(
                    collection,
                    deleted = report.deleted,
                    error = %e,
                    "Wipe stopped before clearing every collection"
                );
                report.failure = Some(WipeFailure {
                    collection: collection.to_string(),
                    message: e.to_string(),
                });
                return Ok(report);
            }
            report.cleared.push(collection.to_string());
        }

        report.deleted = writer.committed();
        tracing::info!(
            deleted = report.deleted,
            chunks = writer.chunks(),
            "Wiped all diagnostic data"
        );
        Ok(report)
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.store().ping().await?;
        Ok(())
    }
}
