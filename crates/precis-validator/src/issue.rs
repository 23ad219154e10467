//! Validation findings

use precis_domain::{Facet, OutcomePartition};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Worth knowing, probably fine
    Info,

    /// Suspicious, needs a human look
    Warning,

    /// Impossible value
    Error,
}

/// Category of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Value outside its mathematical domain
    OutOfRange,

    /// Confidence interval with lower bound above upper bound
    InvalidInterval,

    /// Estimate not contained in its own confidence interval
    EstimateOutsideInterval,

    /// Value possible but implausible for a clinical trial
    ImplausibleValue,

    /// Arm counts that do not shrink from allocation to completion
    ArmInconsistency,

    /// Population size disagrees with the arm allocation sum
    PopulationMismatch,

    /// Safety incidence that does not fit the reported arms
    SafetyCrossReference,

    /// Classified measure without the value it implies
    Incomplete,

    /// Label that could not be classified
    Unclassified,

    /// Mapper coercion worth surfacing
    Coercion,
}

/// Entity a finding refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityRef {
    /// An outcome, by partition and position
    Outcome {
        /// Partition list holding the outcome
        partition: OutcomePartition,
        /// Position in that list
        index: usize,
        /// Outcome name
        name: String,
    },

    /// An arm, by position
    Arm {
        /// Position in the arm list
        index: usize,
        /// Arm label
        label: String,
    },

    /// A safety event, optionally narrowed to one arm's incidence
    SafetyEvent {
        /// Position in the event list
        index: usize,
        /// Event name
        name: String,
        /// Arm label of the incidence entry
        arm: Option<String>,
    },

    /// The study design block
    Design,

    /// The main finding sentence
    MainFinding,

    /// A mapped field
    Field {
        /// Facet the field came from
        facet: Facet,
        /// JSON path of the field
        path: String,
    },
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Outcome {
                partition,
                index,
                name,
            } => write!(f, "outcomes.{}[{}] '{}'", partition.as_str(), index, name),
            EntityRef::Arm { index, label } => write!(f, "arms[{}] '{}'", index, label),
            EntityRef::SafetyEvent { index, name, arm } => match arm {
                Some(arm) => write!(f, "safety_events[{}] '{}' ({})", index, name, arm),
                None => write!(f, "safety_events[{}] '{}'", index, name),
            },
            EntityRef::Design => write!(f, "design"),
            EntityRef::MainFinding => write!(f, "results.main_finding"),
            EntityRef::Field { facet, path } => write!(f, "{}.{}", facet, path),
        }
    }
}

/// One advisory finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Severity
    pub severity: Severity,

    /// Category
    pub kind: IssueKind,

    /// Human-readable description
    pub message: String,

    /// Entity concerned, if any
    pub entity: Option<EntityRef>,
}

impl ValidationIssue {
    /// Create an issue
    pub fn new(
        severity: Severity,
        kind: IssueKind,
        message: impl Into<String>,
        entity: Option<EntityRef>,
    ) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            entity,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.severity, self.message)?;
        if let Some(entity) = &self.entity {
            write!(f, " at {}", entity)?;
        }
        Ok(())
    }
}
