//! DiagnosisRepository implementation for SQLite.

use std::collections::HashMap;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::core::{BackendKind, DiagnosisRepository};
use crate::error::{StorageError, StorageResult};
use crate::types::date::{format_iso_date, parse_stored_date};
use crate::types::{
    value_from_text, Diagnosis, DiagnosisSummary, Measurement, NewDiagnosis, NewPatient,
    NewProfessional, Observation, Patient, PreparedReport, Professional, ReferenceEntity,
    ReferenceKind, Study, WipeReport,
};

use super::backend::BACKEND_NAME;
use super::schema::WIPE_ORDER;
use super::SqliteBackend;

fn internal_error(message: String) -> StorageError {
    StorageError::internal(BACKEND_NAME, message)
}

fn label_table(kind: ReferenceKind) -> &'static str {
    match kind {
        ReferenceKind::StudyType => "study_types",
        ReferenceKind::Organ => "organs",
        ReferenceKind::Unit => "units",
        ReferenceKind::MeasureType => "measure_types",
    }
}

/// Ids are rendered as decimal strings; anything else cannot name a row.
fn parse_id(id: &str) -> Option<i64> {
    id.trim().parse::<i64>().ok()
}

/// Labels resolved while writing one aggregate.
type LabelCache = HashMap<(ReferenceKind, String), i64>;

/// Returns the id of the reference entity with this label, inserting it if
/// absent. Callers hold a `BEGIN IMMEDIATE` transaction, so no other writer
/// can insert the label between the read and the insert.
fn get_or_create_label(
    conn: &Connection,
    cache: &mut LabelCache,
    kind: ReferenceKind,
    label: &str,
) -> StorageResult<i64> {
    if let Some(id) = cache.get(&(kind, label.to_string())) {
        return Ok(*id);
    }

    let table = label_table(kind);
    let select = format!("SELECT id FROM {} WHERE label = ?1", table);
    let existing: Option<i64> = conn
        .prepare_cached(&select)?
        .query_row([label], |row| row.get(0))
        .optional()?;

    let id = match existing {
        Some(id) => id,
        None => {
            let insert = format!("INSERT INTO {} (label) VALUES (?1)", table);
            conn.execute(&insert, [label])?;
            tracing::debug!(kind = %kind, label, "Created reference entity");
            conn.last_insert_rowid()
        }
    };

    cache.insert((kind, label.to_string()), id);
    Ok(id)
}

/// Same get-or-create protocol keyed by the professional's full name.
fn get_or_create_professional(conn: &Connection, professional: &NewProfessional) -> StorageResult<i64> {
    const SELECT: &str = "SELECT id FROM professionals WHERE first_name = ?1 AND last_name = ?2";

    let existing: Option<i64> = conn
        .prepare_cached(SELECT)?
        .query_row(
            params![professional.first_name, professional.last_name],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute(
        "INSERT INTO professionals (first_name, last_name, license) VALUES (?1, ?2, ?3)",
        params![
            professional.first_name,
            professional.last_name,
            professional.license
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_patient(conn: &Connection, patient: &NewPatient) -> StorageResult<i64> {
    conn.execute(
        "INSERT INTO patients (name, guardian, age, breed) VALUES (?1, ?2, ?3, ?4)",
        params![patient.name, patient.guardian, patient.age, patient.breed],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Writes every row of the aggregate. The caller owns the transaction.
fn insert_aggregate(
    conn: &Connection,
    diagnosis: &NewDiagnosis,
    report: &PreparedReport,
) -> StorageResult<i64> {
    let mut labels = LabelCache::new();

    let patient_id = insert_patient(conn, &diagnosis.patient)?;
    let professional_id = get_or_create_professional(conn, &diagnosis.professional)?;

    conn.execute(
        "INSERT INTO reports (history, diagnosis, image_folder, report_date, patient_id, professional_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            report.history,
            report.diagnosis,
            report.image_folder,
            format_iso_date(report.date),
            patient_id,
            professional_id
        ],
    )?;
    let report_id = conn.last_insert_rowid();

    for study in &diagnosis.report.studies {
        let study_type_id =
            get_or_create_label(conn, &mut labels, ReferenceKind::StudyType, &study.study_type)?;
        conn.execute(
            "INSERT INTO studies (report_id, study_type_id) VALUES (?1, ?2)",
            params![report_id, study_type_id],
        )?;
        let study_id = conn.last_insert_rowid();

        for measurement in &study.measurements {
            let measure_type_id = get_or_create_label(
                conn,
                &mut labels,
                ReferenceKind::MeasureType,
                &measurement.kind,
            )?;
            let organ_id =
                get_or_create_label(conn, &mut labels, ReferenceKind::Organ, &measurement.organ)?;
            let unit_id = match measurement.unit.as_deref() {
                Some(unit) => Some(get_or_create_label(
                    conn,
                    &mut labels,
                    ReferenceKind::Unit,
                    unit,
                )?),
                None => None,
            };
            conn.prepare_cached(
                "INSERT INTO measurements (study_id, measure_type_id, organ_id, unit_id, value)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?
            .execute(params![
                study_id,
                measure_type_id,
                organ_id,
                unit_id,
                measurement.value_text()
            ])?;
        }

        for observation in &study.observations {
            let organ_id =
                get_or_create_label(conn, &mut labels, ReferenceKind::Organ, &observation.organ)?;
            conn.prepare_cached(
                "INSERT INTO observations (study_id, organ_id, note) VALUES (?1, ?2, ?3)",
            )?
            .execute(params![study_id, organ_id, observation.note])?;
        }
    }

    Ok(report_id)
}

/// Parses a stored measurement value; unparseable text reads as absent.
fn read_value(measurement_id: i64, text: Option<String>) -> Option<f64> {
    let text = text?;
    let value = value_from_text(&text);
    if value.is_none() {
        tracing::warn!(
            measurement_id,
            value = %text,
            "Stored measurement value is not numeric; reading as absent"
        );
    }
    value
}

/// Loads the full tree of one report in a fixed number of queries.
fn load_diagnosis(conn: &Connection, report_id: i64) -> StorageResult<Option<Diagnosis>> {
    let head = conn
        .query_row(
            "SELECT r.id, r.history, r.diagnosis, r.image_folder, r.report_date,
                    p.id, p.name, p.guardian, p.age, p.breed,
                    v.id, v.first_name, v.last_name, v.license
             FROM reports r
             JOIN patients p ON p.id = r.patient_id
             JOIN professionals v ON v.id = r.professional_id
             WHERE r.id = ?1",
            [report_id],
            |row| {
                let stored_date: String = row.get(4)?;
                let date = parse_stored_date(&stored_date).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        4,
                        rusqlite::types::Type::Text,
                        format!("unreadable report date '{}'", stored_date).into(),
                    )
                })?;
                Ok(Diagnosis {
                    id: row.get::<_, i64>(0)?.to_string(),
                    history: row.get(1)?,
                    diagnosis: row.get(2)?,
                    date,
                    image_folder: row.get(3)?,
                    patient: Patient {
                        id: row.get::<_, i64>(5)?.to_string(),
                        name: row.get(6)?,
                        guardian: row.get(7)?,
                        age: row.get(8)?,
                        breed: row.get(9)?,
                    },
                    professional: Professional {
                        id: row.get::<_, i64>(10)?.to_string(),
                        first_name: row.get(11)?,
                        last_name: row.get(12)?,
                        license: row.get(13)?,
                    },
                    studies: Vec::new(),
                })
            },
        )
        .optional()?;

    let Some(mut diagnosis) = head else {
        return Ok(None);
    };

    let mut study_index: HashMap<i64, usize> = HashMap::new();
    let mut stmt = conn.prepare_cached(
        "SELECT s.id, st.label
         FROM studies s JOIN study_types st ON st.id = s.study_type_id
         WHERE s.report_id = ?1
         ORDER BY s.id",
    )?;
    let rows = stmt.query_map([report_id], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (study_id, study_type) = row?;
        study_index.insert(study_id, diagnosis.studies.len());
        diagnosis.studies.push(Study {
            id: study_id.to_string(),
            study_type,
            measurements: Vec::new(),
            observations: Vec::new(),
        });
    }

    let mut stmt = conn.prepare_cached(
        "SELECT m.id, m.study_id, mt.label, m.value, o.label, u.label
         FROM measurements m
         JOIN studies s ON s.id = m.study_id
         JOIN measure_types mt ON mt.id = m.measure_type_id
         JOIN organs o ON o.id = m.organ_id
         LEFT JOIN units u ON u.id = m.unit_id
         WHERE s.report_id = ?1
         ORDER BY m.id",
    )?;
    let rows = stmt.query_map([report_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
        ))
    })?;
    for row in rows {
        let (id, study_id, kind, value, organ, unit) = row?;
        if let Some(&index) = study_index.get(&study_id) {
            diagnosis.studies[index].measurements.push(Measurement {
                id: id.to_string(),
                kind,
                value: read_value(id, value),
                organ,
                unit,
            });
        }
    }

    let mut stmt = conn.prepare_cached(
        "SELECT ob.id, ob.study_id, ob.note, o.label
         FROM observations ob
         JOIN studies s ON s.id = ob.study_id
         JOIN organs o ON o.id = ob.organ_id
         WHERE s.report_id = ?1
         ORDER BY ob.id",
    )?;
    let rows = stmt.query_map([report_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;
    for row in rows {
        let (id, study_id, note, organ) = row?;
        if let Some(&index) = study_index.get(&study_id) {
            diagnosis.studies[index].observations.push(Observation {
                id: id.to_string(),
                note,
                organ,
            });
        }
    }

    Ok(Some(diagnosis))
}

#[async_trait]
impl DiagnosisRepository for SqliteBackend {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    async fn create_diagnosis(&self, diagnosis: &NewDiagnosis) -> StorageResult<String> {
        let report = diagnosis.report.prepare()?;

        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Dropping the transaction on any error rolls back every row written so far.
        let report_id = insert_aggregate(&tx, diagnosis, &report)?;
        tx.commit()?;

        tracing::info!(
            report_id,
            studies = diagnosis.report.studies.len(),
            "Created diagnosis"
        );
        Ok(report_id.to_string())
    }

    async fn get_diagnosis(&self, id: &str) -> StorageResult<Option<Diagnosis>> {
        let Some(report_id) = parse_id(id) else {
            tracing::debug!(id, "Non-numeric diagnosis id");
            return Ok(None);
        };

        let mut conn = self.get_connection()?;
        // Read every table from one snapshot.
        let tx = conn.transaction()?;
        let diagnosis = load_diagnosis(&tx, report_id)?;
        tx.commit()?;
        Ok(diagnosis)
    }

    async fn list_diagnosis_summaries(&self) -> StorageResult<Vec<DiagnosisSummary>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare_cached(
            "SELECT r.id, p.name, p.guardian, p.age, p.breed, r.report_date
             FROM reports r JOIN patients p ON p.id = r.patient_id
             ORDER BY r.report_date, r.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            let (id, name, guardian, age, breed, stored_date) = row?;
            let Some(date) = parse_stored_date(&stored_date) else {
                tracing::warn!(report_id = id, date = %stored_date, "Skipping report with unreadable date");
                continue;
            };
            summaries.push(DiagnosisSummary {
                id: id.to_string(),
                name,
                guardian,
                age,
                breed,
                date,
            });
        }
        Ok(summaries)
    }

    async fn list_patients(&self) -> StorageResult<Vec<Patient>> {
        let conn = self.get_connection()?;
        let mut stmt =
            conn.prepare_cached("SELECT id, name, guardian, age, breed FROM patients ORDER BY id")?;
        let patients = stmt
            .query_map([], |row| {
                Ok(Patient {
                    id: row.get::<_, i64>(0)?.to_string(),
                    name: row.get(1)?,
                    guardian: row.get(2)?,
                    age: row.get(3)?,
                    breed: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(patients)
    }

    async fn create_patient(&self, patient: &NewPatient) -> StorageResult<String> {
        let conn = self.get_connection()?;
        let id = insert_patient(&conn, patient)?;
        tracing::debug!(patient_id = id, "Created patient");
        Ok(id.to_string())
    }

    async fn get_professional(&self, id: &str) -> StorageResult<Option<Professional>> {
        let Some(professional_id) = parse_id(id) else {
            return Ok(None);
        };

        let conn = self.get_connection()?;
        let professional = conn
            .query_row(
                "SELECT id, first_name, last_name, license FROM professionals WHERE id = ?1",
                [professional_id],
                |row| {
                    Ok(Professional {
                        id: row.get::<_, i64>(0)?.to_string(),
                        first_name: row.get(1)?,
                        last_name: row.get(2)?,
                        license: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(professional)
    }

    async fn create_professional(&self, professional: &NewProfessional) -> StorageResult<String> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let id = get_or_create_professional(&tx, professional)?;
        tx.commit()?;
        Ok(id.to_string())
    }

    async fn delete_diagnosis(&self, id: &str) -> StorageResult<bool> {
        let Some(report_id) = parse_id(id) else {
            return Ok(false);
        };

        let conn = self.get_connection()?;
        // Studies, measurements and observations go with the report via ON DELETE CASCADE.
        let deleted = conn.execute("DELETE FROM reports WHERE id = ?1", [report_id])?;
        if deleted > 0 {
            tracing::info!(report_id, "Deleted diagnosis");
        }
        Ok(deleted > 0)
    }

    async fn list_reference_entities(
        &self,
        kind: ReferenceKind,
    ) -> StorageResult<Vec<ReferenceEntity>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT id, label FROM {} ORDER BY label, id",
            label_table(kind)
        ))?;
        let entities = stmt
            .query_map([], |row| {
                Ok(ReferenceEntity {
                    id: row.get::<_, i64>(0)?.to_string(),
                    label: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entities)
    }

    async fn wipe_all(&self) -> StorageResult<WipeReport> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut report = WipeReport::default();
        for table in WIPE_ORDER {
            let deleted = tx.execute(&format!("DELETE FROM {}", table), [])?;
            report.deleted += deleted;
            report.cleared.push((*table).to_string());
        }
        tx.commit()?;

        tracing::info!(deleted = report.deleted, "Wiped all diagnostic data");
        Ok(report)
    }

    async fn health_check(&self) -> StorageResult<()> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|e| internal_error(format!("Health check failed: {}", e)))?;
        Ok(())
    }
}
