//! Aggregate fixtures.

use diagnovet_persistence::types::{
    DiagnosisText, NewDiagnosis, NewMeasurement, NewObservation, NewPatient, NewProfessional,
    NewReport, NewStudy,
};

pub fn patient(name: &str, guardian: &str) -> NewPatient {
    NewPatient {
        name: name.to_string(),
        guardian: guardian.to_string(),
        age: None,
        breed: None,
    }
}

pub fn juan_perez() -> NewProfessional {
    NewProfessional {
        first_name: "Juan".to_string(),
        last_name: "Perez".to_string(),
        license: Some(123),
    }
}

pub fn measurement(kind: &str, value: Option<f64>, unit: Option<&str>, organ: &str) -> NewMeasurement {
    NewMeasurement {
        kind: kind.to_string(),
        value,
        unit: unit.map(str::to_string),
        organ: organ.to_string(),
    }
}

pub fn observation(organ: &str, note: &str) -> NewObservation {
    NewObservation {
        organ: organ.to_string(),
        note: note.to_string(),
    }
}

/// Rex, a five year old Labrador, with one X-ray measuring his spine.
pub fn rex() -> NewDiagnosis {
    NewDiagnosis {
        patient: NewPatient {
            name: "Rex".to_string(),
            guardian: "Ana".to_string(),
            age: Some("5 years".to_string()),
            breed: Some("Labrador".to_string()),
        },
        professional: juan_perez(),
        report: NewReport {
            history: Some("Limping on the left hind leg".to_string()),
            diagnosis: Some(DiagnosisText::from("Healthy")),
            image_folder: Some("rex/2024-02-01".to_string()),
            date: Some("01/02/2024".to_string()),
            studies: vec![NewStudy {
                study_type: "X-ray".to_string(),
                measurements: vec![measurement("length", Some(12.5), Some("cm"), "Spine")],
                observations: vec![],
            }],
        },
    }
}

/// An ultrasound aggregate for `name` touching the heart.
pub fn heart_study(name: &str, date: &str) -> NewDiagnosis {
    NewDiagnosis {
        patient: patient(name, "Luis"),
        professional: juan_perez(),
        report: NewReport {
            history: None,
            diagnosis: Some(DiagnosisText::Items(vec![
                "Cardiomegaly".to_string(),
                "Mild effusion".to_string(),
            ])),
            image_folder: None,
            date: Some(date.to_string()),
            studies: vec![
                NewStudy {
                    study_type: "Ultrasound".to_string(),
                    measurements: vec![
                        measurement("diameter", Some(4.2), Some("cm"), "Heart"),
                        measurement("thickness", None, None, "Heart"),
                    ],
                    observations: vec![observation("Heart", "Enlarged left atrium")],
                },
                NewStudy {
                    study_type: "X-ray".to_string(),
                    measurements: vec![],
                    observations: vec![
                        observation("Lungs", "Clear"),
                        observation("Heart", "Rounded silhouette"),
                    ],
                },
            ],
        },
    }
}

/// An aggregate with `studies` studies of `per_study` measurements each.
pub fn wide_diagnosis(studies: usize, per_study: usize) -> NewDiagnosis {
    let mut diagnosis = rex();
    diagnosis.report.studies = (0..studies)
        .map(|s| NewStudy {
            study_type: "Ultrasound".to_string(),
            measurements: (0..per_study)
                .map(|m| measurement("length", Some(m as f64), Some("mm"), &format!("Organ {s}")))
                .collect(),
            observations: vec![],
        })
        .collect();
    diagnosis
}
