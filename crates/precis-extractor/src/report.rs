//! What a finished run hands back

use crate::run::Transition;
use precis_domain::{Facet, MappingNote, Overview, RunId, TrialSummary};
use precis_llm::Failure;
use precis_validator::ValidationIssue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A segment whose summary could not be produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentFailure {
    /// Segment index
    pub index: usize,

    /// Why it failed
    pub failure: Failure,
}

/// Everything the run recovered from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    /// Segments left out of the overview
    pub segment_failures: Vec<SegmentFailure>,

    /// Facets whose section of the summary holds defaults
    pub facet_failures: BTreeMap<Facet, Failure>,

    /// Combine failure that forced a concatenated overview
    pub overview_fallback: Option<Failure>,
}

impl FailureReport {
    /// Facets that were defaulted, in registry order
    pub fn defaulted_facets(&self) -> Vec<Facet> {
        self.facet_failures.keys().copied().collect()
    }

    /// Whether nothing failed at all
    pub fn is_clean(&self) -> bool {
        self.segment_failures.is_empty()
            && self.facet_failures.is_empty()
            && self.overview_fallback.is_none()
    }
}

/// Facts about how a run was executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Model identifier reported by the provider
    pub model: String,

    /// Segments produced by the segmenter
    pub segments: usize,

    /// Partial summaries that fed the overview
    pub partials_used: usize,

    /// Wall-clock duration of the run
    pub elapsed_ms: u64,

    /// Layout version of the summary
    pub schema_version: u32,
}

/// Result of a completed run
///
/// A completed run always carries a summary. Sections whose extractor failed
/// hold default values and are listed in [`FailureReport::facet_failures`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run identifier
    pub run_id: RunId,

    /// Best-effort typed result
    pub summary: TrialSummary,

    /// Validator findings on the summary
    pub issues: Vec<ValidationIssue>,

    /// Informational findings derived from mapping notes
    pub advisories: Vec<ValidationIssue>,

    /// Recovered failures
    pub failures: FailureReport,

    /// Conversions the mapper applied
    pub notes: Vec<MappingNote>,

    /// Overview the extractors worked from
    pub overview: Overview,

    /// State changes, in order
    pub transitions: Vec<Transition>,

    /// Execution facts
    pub metadata: RunMetadata,
}

impl RunReport {
    /// Whether any section of the summary was defaulted
    pub fn is_partial(&self) -> bool {
        !self.failures.facet_failures.is_empty()
    }

    /// Serialize the report as pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use precis_llm::FailureKind;

    #[test]
    fn test_defaulted_facets_in_registry_order() {
        let mut report = FailureReport::default();
        assert!(report.is_clean());

        report
            .facet_failures
            .insert(Facet::SafetyEvents, Failure::malformed("bad json"));
        report
            .facet_failures
            .insert(Facet::Metadata, Failure::new(FailureKind::Transient, "timeout"));

        assert_eq!(report.defaulted_facets(), vec![Facet::Metadata, Facet::SafetyEvents]);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_failure_report_serializes_facet_keys() {
        let mut report = FailureReport::default();
        report
            .facet_failures
            .insert(Facet::Arms, Failure::malformed("bad json"));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["facet_failures"]["arms"]["kind"], "malformed");
    }
}
