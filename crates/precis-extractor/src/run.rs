//! Run identity and lifecycle

use crate::config::PipelineConfig;
use precis_domain::{Document, RunId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Immutable inputs shared by every stage of one run
///
/// Cloning is cheap: the document and configuration are reference counted and
/// never mutated once the run has started.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Identifier attached to every log line and to the report
    pub run_id: RunId,

    /// Input document
    pub document: Arc<Document>,

    /// Configuration in effect for the run
    pub config: Arc<PipelineConfig>,
}

impl RunContext {
    /// Start a new run
    pub fn new(document: Document, config: Arc<PipelineConfig>) -> Self {
        Self {
            run_id: RunId::new(),
            document: Arc::new(document),
            config,
        }
    }
}

/// Position of a run in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Splitting the document
    Segmenting,
    /// Summarizing segments in parallel
    Summarizing,
    /// Reducing partial summaries to an overview
    Combining,
    /// Running the specialized extractors in parallel
    Extracting,
    /// Typing the raw extraction output
    Mapping,
    /// Checking the typed summary
    Validating,
    /// Finished with a report
    Done,
    /// Finished without a report
    Failed,
    /// Stopped by the caller
    Cancelled,
}

impl RunState {
    /// State name
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Segmenting => "segmenting",
            RunState::Summarizing => "summarizing",
            RunState::Combining => "combining",
            RunState::Extracting => "extracting",
            RunState::Mapping => "mapping",
            RunState::Validating => "validating",
            RunState::Done => "done",
            RunState::Failed => "failed",
            RunState::Cancelled => "cancelled",
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed | RunState::Cancelled)
    }

    /// Whether `next` is a legal successor of this state
    ///
    /// Stages only move forward. Any running state may be cancelled; a run
    /// fails only on empty input or when no partial summary survived.
    pub fn can_advance_to(&self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (s, _) if s.is_terminal() => false,
            (_, Cancelled) => true,
            (Segmenting, Summarizing) | (Segmenting, Failed) => true,
            (Summarizing, Combining) => true,
            (Combining, Extracting) | (Combining, Failed) => true,
            (Extracting, Mapping) => true,
            (Mapping, Validating) => true,
            (Validating, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// State entered
    pub state: RunState,

    /// Milliseconds since the run started
    pub at_ms: u64,
}
