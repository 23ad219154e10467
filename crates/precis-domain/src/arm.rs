//! Treatment arms

use serde::{Deserialize, Serialize};

/// One treatment arm of a study
///
/// Counts are signed so that impossible values reported by the model
/// (e.g. `-3`) survive mapping and can be flagged by validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arm {
    /// Arm label
    pub label: String,

    /// Participants allocated
    pub allocated: Option<i64>,

    /// Participants analyzed
    pub analyzed: Option<i64>,

    /// Participants who completed
    pub completed: Option<i64>,

    /// Intervention description
    pub description: Option<String>,
}

impl Arm {
    /// Whether the arm label matches another label (case-insensitive)
    pub fn matches_label(&self, label: &str) -> bool {
        self.label.trim().eq_ignore_ascii_case(label.trim())
    }
}
