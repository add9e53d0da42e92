//! Outcome of a store-wide wipe.

use serde::{Deserialize, Serialize};

/// Where a wipe stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WipeFailure {
    /// Table or collection being cleared when the failure happened.
    pub collection: String,
    /// Backend cause.
    pub message: String,
}

/// Result of [`wipe_all`](crate::core::DiagnosisRepository::wipe_all).
///
/// A wipe may stop partway on backends without store-wide transactions; the
/// failure is reported here rather than as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WipeReport {
    /// Rows or documents removed.
    pub deleted: usize,
    /// Tables or collections fully cleared, in the order they were cleared.
    pub cleared: Vec<String>,
    /// Set when the wipe stopped before clearing everything.
    pub failure: Option<WipeFailure>,
}

impl WipeReport {
    /// True when every managed table or collection was cleared.
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}
