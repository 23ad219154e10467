//! Coercion decisions recorded while typing raw extraction output

use crate::Facet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the mapper did with a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteAction {
    /// Value had the wrong type and was converted
    Coerced,

    /// Value could not be converted and was treated as missing
    Dropped,

    /// A list element was not an object and was skipped
    SkippedElement,

    /// An enumeration label did not match and was kept as `Unknown`
    Unclassified,
}

impl NoteAction {
    /// Action name
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteAction::Coerced => "coerced",
            NoteAction::Dropped => "dropped",
            NoteAction::SkippedElement => "skipped_element",
            NoteAction::Unclassified => "unclassified",
        }
    }
}

/// One coercion decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingNote {
    /// Facet whose output was being mapped
    pub facet: Facet,

    /// JSON path of the field (e.g. `outcomes[2].p_value`)
    pub path: String,

    /// Decision taken
    pub action: NoteAction,

    /// Human-readable detail, usually the raw value
    pub detail: String,
}

impl fmt::Display for MappingNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}: {} ({})",
            self.facet,
            self.path,
            self.action.as_str(),
            self.detail
        )
    }
}
