//! Behaviour every `DiagnosisRepository` must show, run against each backend.

use diagnovet_persistence::core::DiagnosisRepository;
use diagnovet_persistence::error::{StorageError, ValidationError};
use diagnovet_persistence::types::{DiagnosisText, NewDiagnosis, ReferenceKind};

use super::fixtures::{heart_study, juan_perez, patient, rex};

/// Asserts a stored aggregate matches what was written, ignoring ids.
pub fn assert_matches_input(stored: &diagnovet_persistence::types::Diagnosis, input: &NewDiagnosis) {
    let prepared = input.report.prepare().unwrap();
    assert_eq!(stored.diagnosis, prepared.diagnosis);
    assert_eq!(stored.date, prepared.date);
    assert_eq!(stored.history, input.report.history);
    assert_eq!(stored.image_folder, input.report.image_folder);

    assert_eq!(stored.patient.name, input.patient.name);
    assert_eq!(stored.patient.guardian, input.patient.guardian);
    assert_eq!(stored.patient.age, input.patient.age);
    assert_eq!(stored.patient.breed, input.patient.breed);

    assert_eq!(stored.professional.first_name, input.professional.first_name);
    assert_eq!(stored.professional.last_name, input.professional.last_name);
    assert_eq!(stored.professional.license, input.professional.license);

    assert_eq!(stored.studies.len(), input.report.studies.len());
    for (study, expected) in stored.studies.iter().zip(&input.report.studies) {
        assert_eq!(study.study_type, expected.study_type);
        assert_eq!(study.measurements.len(), expected.measurements.len());
        for (m, e) in study.measurements.iter().zip(&expected.measurements) {
            assert_eq!(m.kind, e.kind);
            assert_eq!(m.value, e.value);
            assert_eq!(m.unit, e.unit);
            assert_eq!(m.organ, e.organ);
            assert!(!m.id.is_empty());
        }
        assert_eq!(study.observations.len(), expected.observations.len());
        for (o, e) in study.observations.iter().zip(&expected.observations) {
            assert_eq!(o.note, e.note);
            assert_eq!(o.organ, e.organ);
        }
    }
}

pub async fn check_rex_round_trip(repo: &dyn DiagnosisRepository) {
    let input = rex();
    let id = repo.create_diagnosis(&input).await.unwrap();
    assert!(!id.is_empty());

    let stored = repo.get_diagnosis(&id).await.unwrap().expect("diagnosis exists");
    assert_eq!(stored.id, id);
    assert_eq!(stored.studies.len(), 1);
    let measurement = &stored.studies[0].measurements[0];
    assert_eq!(measurement.value, Some(12.5));
    assert_eq!(measurement.organ, "Spine");
    assert_eq!(stored.date.to_string(), "2024-02-01");
    assert_matches_input(&stored, &input);
}

pub async fn check_nested_round_trip(repo: &dyn DiagnosisRepository) {
    let input = heart_study("Luna", "15/03/2024");
    let id = repo.create_diagnosis(&input).await.unwrap();

    let stored = repo.get_diagnosis(&id).await.unwrap().unwrap();
    assert_matches_input(&stored, &input);
    assert_eq!(stored.diagnosis, "Cardiomegaly; Mild effusion");
    assert_eq!(stored.studies[0].measurements[1].value, None);
    assert_eq!(stored.studies[0].measurements[1].unit, None);
}

pub async fn check_missing_lookups_are_empty(repo: &dyn DiagnosisRepository) {
    assert!(repo.get_diagnosis("does-not-exist").await.unwrap().is_none());
    assert!(repo.get_diagnosis("999999").await.unwrap().is_none());
    assert!(repo.get_professional("nobody").await.unwrap().is_none());
    assert!(!repo.delete_diagnosis("does-not-exist").await.unwrap());
}

pub async fn check_reference_entities_are_reused(repo: &dyn DiagnosisRepository) {
    let first = repo.create_diagnosis(&heart_study("Luna", "01/03/2024")).await.unwrap();
    let second = repo.create_diagnosis(&heart_study("Milo", "02/03/2024")).await.unwrap();

    let organs = repo.list_reference_entities(ReferenceKind::Organ).await.unwrap();
    let labels: Vec<_> = organs.iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, vec!["Heart", "Lungs"]);

    let study_types = repo
        .list_reference_entities(ReferenceKind::StudyType)
        .await
        .unwrap();
    assert_eq!(study_types.len(), 2);
    let units = repo.list_reference_entities(ReferenceKind::Unit).await.unwrap();
    assert_eq!(units.len(), 1);
    let measure_types = repo
        .list_reference_entities(ReferenceKind::MeasureType)
        .await
        .unwrap();
    assert_eq!(measure_types.len(), 2);

    // Both aggregates still read back their own labels.
    for id in [first, second] {
        let stored = repo.get_diagnosis(&id).await.unwrap().unwrap();
        assert_eq!(stored.studies[0].observations[0].organ, "Heart");
        assert_eq!(stored.studies[1].observations[0].organ, "Lungs");
    }
}

pub async fn check_patients_are_never_shared(repo: &dyn DiagnosisRepository) {
    let first = repo.create_diagnosis(&rex()).await.unwrap();
    let second = repo.create_diagnosis(&rex()).await.unwrap();

    let a = repo.get_diagnosis(&first).await.unwrap().unwrap();
    let b = repo.get_diagnosis(&second).await.unwrap().unwrap();
    assert_ne!(a.patient.id, b.patient.id);
    assert_eq!(repo.list_patients().await.unwrap().len(), 2);
}

pub async fn check_summaries_are_ordered(repo: &dyn DiagnosisRepository) {
    repo.create_diagnosis(&heart_study("Milo", "20/05/2024")).await.unwrap();
    repo.create_diagnosis(&heart_study("Luna", "03/01/2024")).await.unwrap();
    repo.create_diagnosis(&rex()).await.unwrap();

    let summaries = repo.list_diagnosis_summaries().await.unwrap();
    let names: Vec<_> = summaries.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Luna", "Rex", "Milo"]);

    let rex_summary = &summaries[1];
    assert_eq!(rex_summary.guardian, "Ana");
    assert_eq!(rex_summary.age.as_deref(), Some("5 years"));
    assert_eq!(rex_summary.breed.as_deref(), Some("Labrador"));
    assert_eq!(rex_summary.date.to_string(), "2024-02-01");
}

pub async fn check_invalid_aggregate_is_rejected(repo: &dyn DiagnosisRepository) {
    let mut blank = rex();
    blank.report.diagnosis = Some(DiagnosisText::from("  "));
    let err = repo.create_diagnosis(&blank).await.err().unwrap();
    assert!(matches!(
        err,
        StorageError::Validation(ValidationError::MissingRequiredField { .. })
    ));

    let mut blank_items = rex();
    blank_items.report.diagnosis = Some(DiagnosisText::from(vec![
        "".to_string(),
        " ".to_string(),
    ]));
    let err = repo.create_diagnosis(&blank_items).await.err().unwrap();
    assert!(matches!(
        err,
        StorageError::Validation(ValidationError::MissingRequiredField { .. })
    ));

    let mut bad_date = rex();
    bad_date.report.date = Some("2024/02/01".to_string());
    let err = repo.create_diagnosis(&bad_date).await.err().unwrap();
    assert!(matches!(
        err,
        StorageError::Validation(ValidationError::InvalidDate { .. })
    ));

    // Nothing reached storage.
    assert!(repo.list_diagnosis_summaries().await.unwrap().is_empty());
    assert!(repo.list_patients().await.unwrap().is_empty());
}

pub async fn check_delete_removes_report_subtree(repo: &dyn DiagnosisRepository) {
    let kept = repo.create_diagnosis(&rex()).await.unwrap();
    let id = repo.create_diagnosis(&heart_study("Luna", "01/03/2024")).await.unwrap();

    assert!(repo.delete_diagnosis(&id).await.unwrap());
    assert!(repo.get_diagnosis(&id).await.unwrap().is_none());
    assert!(!repo.delete_diagnosis(&id).await.unwrap());

    // The other aggregate and the patient record survive.
    assert!(repo.get_diagnosis(&kept).await.unwrap().is_some());
    let summaries = repo.list_diagnosis_summaries().await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].id, kept);
    assert_eq!(repo.list_patients().await.unwrap().len(), 2);
}

pub async fn check_wipe_clears_everything(repo: &dyn DiagnosisRepository) {
    for i in 0..5 {
        repo.create_diagnosis(&heart_study(&format!("Pet {i}"), "01/03/2024"))
            .await
            .unwrap();
    }
    repo.create_patient(&patient("Walk-in", "Sofia")).await.unwrap();

    let report = repo.wipe_all().await.unwrap();
    assert!(report.is_complete());
    assert!(report.deleted > 0);

    assert!(repo.list_diagnosis_summaries().await.unwrap().is_empty());
    assert!(repo.list_patients().await.unwrap().is_empty());
    for kind in ReferenceKind::ALL {
        assert!(repo.list_reference_entities(kind).await.unwrap().is_empty());
    }

    // The store is usable after a wipe.
    let id = repo.create_diagnosis(&rex()).await.unwrap();
    assert!(repo.get_diagnosis(&id).await.unwrap().is_some());
}

pub async fn check_standalone_entities(repo: &dyn DiagnosisRepository) {
    let patient_id = repo.create_patient(&patient("Nala", "Pedro")).await.unwrap();
    let patients = repo.list_patients().await.unwrap();
    assert_eq!(patients.len(), 1);
    assert_eq!(patients[0].id, patient_id);
    assert_eq!(patients[0].name, "Nala");

    let professional_id = repo.create_professional(&juan_perez()).await.unwrap();
    let professional = repo
        .get_professional(&professional_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(professional.first_name, "Juan");
    assert_eq!(professional.license, Some(123));
}
