//! Error types for the pipeline

use thiserror::Error;

/// Errors that end a run without a result
///
/// Per-segment and per-facet problems are never reported here; they are
/// recorded as [`Failure`](precis_llm::Failure) values in the run report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The document cannot be processed (e.g. empty text)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Every segment summary failed, so there is nothing to combine
    #[error("No usable partial summaries: all {segments} segment(s) failed")]
    NoUsablePartials {
        /// Number of segments attempted
        segments: usize,
    },

    /// The caller cancelled the run
    #[error("Run cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Whether the run itself failed (as opposed to being stopped or misconfigured)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidInput(_) | PipelineError::NoUsablePartials { .. }
        )
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(e: toml::de::Error) -> Self {
        PipelineError::Config(format!("Failed to parse TOML: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(PipelineError::InvalidInput("empty".into()).is_fatal());
        assert!(PipelineError::NoUsablePartials { segments: 3 }.is_fatal());
        assert!(!PipelineError::Cancelled.is_fatal());
        assert!(!PipelineError::Config("x".into()).is_fatal());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            PipelineError::NoUsablePartials { segments: 4 }.to_string(),
            "No usable partial summaries: all 4 segment(s) failed"
        );
    }
}
