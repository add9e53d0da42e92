//! Administrative commands over the selected repository.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::Subcommand;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use diagnovet_persistence::core::DiagnosisRepository;
use diagnovet_persistence::types::{NewDiagnosis, ReferenceKind};

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Store aggregates from a JSON file holding one aggregate or an array.
    Import {
        /// Path to the JSON file.
        file: PathBuf,
    },
    /// Print one diagnosis with its studies.
    Show {
        /// Diagnosis id.
        id: String,
    },
    /// List diagnosis summaries ordered by report date.
    List,
    /// List stored patients.
    Patients,
    /// List reference entities of one kind (study_type, organ, unit, measure_type).
    References {
        kind: ReferenceKind,
    },
    /// Delete one diagnosis and its studies.
    Delete {
        /// Diagnosis id.
        id: String,
    },
    /// Remove all stored data.
    Wipe {
        /// Confirm the wipe.
        #[arg(long)]
        yes: bool,
    },
    /// Check that the store is reachable.
    Health,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImportPayload {
    Many(Vec<NewDiagnosis>),
    One(Box<NewDiagnosis>),
}

fn read_payload(path: &Path) -> anyhow::Result<Vec<NewDiagnosis>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let payload: ImportPayload = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a diagnosis or a list of diagnoses", path.display()))?;
    Ok(match payload {
        ImportPayload::Many(diagnoses) => diagnoses,
        ImportPayload::One(diagnosis) => vec![*diagnosis],
    })
}

/// Runs a command and returns what should be printed.
pub async fn run(repository: &dyn DiagnosisRepository, command: Command) -> anyhow::Result<Value> {
    match command {
        Command::Import { file } => {
            let diagnoses = read_payload(&file)?;
            let mut ids = Vec::with_capacity(diagnoses.len());
            for (index, diagnosis) in diagnoses.iter().enumerate() {
                let id = repository
                    .create_diagnosis(diagnosis)
                    .await
                    .with_context(|| format!("failed to import entry {}", index))?;
                ids.push(id);
            }
            info!(count = ids.len(), file = %file.display(), "Imported diagnoses");
            Ok(json!({ "created": ids }))
        }
        Command::Show { id } => match repository.get_diagnosis(&id).await? {
            Some(diagnosis) => Ok(serde_json::to_value(diagnosis)?),
            None => bail!("diagnosis {} not found", id),
        },
        Command::List => Ok(serde_json::to_value(
            repository.list_diagnosis_summaries().await?,
        )?),
        Command::Patients => Ok(serde_json::to_value(repository.list_patients().await?)?),
        Command::References { kind } => Ok(serde_json::to_value(
            repository.list_reference_entities(kind).await?,
        )?),
        Command::Delete { id } => {
            if !repository.delete_diagnosis(&id).await? {
                bail!("diagnosis {} not found", id);
            }
            Ok(json!({ "deleted": id }))
        }
        Command::Wipe { yes } => {
            if !yes {
                bail!("refusing to wipe without --yes");
            }
            let report = repository.wipe_all().await?;
            if let Some(failure) = &report.failure {
                tracing::error!(
                    collection = %failure.collection,
                    deleted = report.deleted,
                    "Wipe incomplete"
                );
            }
            Ok(serde_json::to_value(report)?)
        }
        Command::Health => {
            repository.health_check().await?;
            Ok(json!({ "status": "ok", "backend": repository.backend_kind() }))
        }
    }
}
