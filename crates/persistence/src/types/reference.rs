//! Reference entities shared across aggregates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kinds of single-label reference entities, each unique by its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// Study type label, e.g. "X-ray".
    StudyType,
    /// Organ name, e.g. "Heart".
    Organ,
    /// Unit of measure, e.g. "cm".
    Unit,
    /// Measurement kind, e.g. "length".
    MeasureType,
}

impl ReferenceKind {
    /// All reference kinds.
    pub const ALL: [ReferenceKind; 4] = [
        ReferenceKind::StudyType,
        ReferenceKind::Organ,
        ReferenceKind::Unit,
        ReferenceKind::MeasureType,
    ];

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::StudyType => "study_type",
            ReferenceKind::Organ => "organ",
            ReferenceKind::Unit => "unit",
            ReferenceKind::MeasureType => "measure_type",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "study_type" | "study_types" => Ok(ReferenceKind::StudyType),
            "organ" | "organs" => Ok(ReferenceKind::Organ),
            "unit" | "units" => Ok(ReferenceKind::Unit),
            "measure_type" | "measure_types" => Ok(ReferenceKind::MeasureType),
            other => Err(format!("unknown reference kind: {}", other)),
        }
    }
}

/// A resolved reference entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntity {
    /// Storage identifier.
    pub id: String,
    /// Natural key.
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_kind_round_trip() {
        for kind in ReferenceKind::ALL {
            assert_eq!(kind.as_str().parse::<ReferenceKind>().unwrap(), kind);
        }
        assert_eq!("Organs".parse::<ReferenceKind>().unwrap(), ReferenceKind::Organ);
        assert_eq!(
            "measure-type".parse::<ReferenceKind>().unwrap(),
            ReferenceKind::MeasureType
        );
        assert!("species".parse::<ReferenceKind>().is_err());
    }
}
