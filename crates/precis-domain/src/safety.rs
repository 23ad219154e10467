//! Safety and adverse events

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Incidence of an event in one arm
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Incidence {
    /// Percentage of participants
    pub percent: Option<f64>,

    /// Number of participants
    pub count: Option<i64>,
}

impl Incidence {
    /// Whether neither percent nor count is known
    pub fn is_empty(&self) -> bool {
        self.percent.is_none() && self.count.is_none()
    }
}

/// One reported safety or adverse event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SafetyEvent {
    /// Event name
    pub name: String,

    /// Category (e.g. "gastrointestinal", "cardiovascular")
    pub category: Option<String>,

    /// Incidence per arm label
    pub incidence: BTreeMap<String, Incidence>,

    /// Serious adverse event
    pub serious: bool,

    /// Led to discontinuation
    pub led_to_discontinuation: bool,

    /// Free-text notes
    pub notes: Option<String>,
}
