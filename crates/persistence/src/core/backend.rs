//! Backend identification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifies which storage model backs a repository.
///
/// Chosen once from configuration; there is no runtime re-selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Normalized relational store (SQLite) with foreign keys.
    #[default]
    Relational,
    /// Denormalized document store with string references.
    Document,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Relational => write!(f, "relational"),
            BackendKind::Document => write!(f, "document"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relational" | "sql" | "sqlite" => Ok(BackendKind::Relational),
            "document" | "documents" | "mongodb" | "firestore" => Ok(BackendKind::Document),
            other => Err(format!(
                "unsupported backend '{}': expected 'relational' or 'document'",
                other
            )),
        }
    }
}
