//! The aggregate result of an extraction run

use crate::{Arm, Outcome, OutcomePartition, SafetyEvent};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version of the serialized `TrialSummary` layout
pub const SCHEMA_VERSION: u32 = 1;

/// Study design classification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DesignType {
    /// Randomized controlled trial
    RandomizedControlled,
    /// Parallel-group
    Parallel,
    /// Crossover
    Crossover,
    /// Factorial
    Factorial,
    /// Cluster-randomized
    ClusterRandomized,
    /// Single-arm
    SingleArm,
    /// Observational
    Observational,
    /// Cohort
    Cohort,
    /// Case-control
    CaseControl,
    /// Cross-sectional
    CrossSectional,
    /// Meta-analysis
    MetaAnalysis,
    /// Pharmacokinetic
    Pharmacokinetic,
    /// Phase 1
    Phase1,
    /// Phase 2
    Phase2,
    /// Phase 3
    Phase3,
    /// Phase 4
    Phase4,
    /// Unclassified design (raw label preserved)
    Unknown(String),
}

impl DesignType {
    /// Canonical identifier
    pub fn as_str(&self) -> &str {
        match self {
            DesignType::RandomizedControlled => "randomized_controlled_trial",
            DesignType::Parallel => "parallel",
            DesignType::Crossover => "crossover",
            DesignType::Factorial => "factorial",
            DesignType::ClusterRandomized => "cluster_randomized_trial",
            DesignType::SingleArm => "single_arm",
            DesignType::Observational => "observational",
            DesignType::Cohort => "cohort",
            DesignType::CaseControl => "case_control",
            DesignType::CrossSectional => "cross_sectional",
            DesignType::MetaAnalysis => "meta_analysis",
            DesignType::Pharmacokinetic => "pharmacokinetic",
            DesignType::Phase1 => "phase_1",
            DesignType::Phase2 => "phase_2",
            DesignType::Phase3 => "phase_3",
            DesignType::Phase4 => "phase_4",
            DesignType::Unknown(raw) => raw,
        }
    }

    /// Classify a raw label, falling back to `Unknown`
    pub fn parse(raw: &str) -> Self {
        let key: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();

        match key.as_str() {
            "rct" | "randomized_controlled_trial" | "randomised_controlled_trial"
            | "randomized_controlled" => DesignType::RandomizedControlled,
            "parallel" | "parallel_group" => DesignType::Parallel,
            "crossover" | "cross_over" => DesignType::Crossover,
            "factorial" => DesignType::Factorial,
            "cluster_randomized_trial" | "cluster_rct" => DesignType::ClusterRandomized,
            "single_arm" => DesignType::SingleArm,
            "observational" => DesignType::Observational,
            "cohort" => DesignType::Cohort,
            "case_control" => DesignType::CaseControl,
            "cross_sectional" => DesignType::CrossSectional,
            "meta_analysis" => DesignType::MetaAnalysis,
            "pharmacokinetic" | "pk" => DesignType::Pharmacokinetic,
            "phase_1" | "phase_i" => DesignType::Phase1,
            "phase_2" | "phase_ii" => DesignType::Phase2,
            "phase_3" | "phase_iii" => DesignType::Phase3,
            "phase_4" | "phase_iv" => DesignType::Phase4,
            _ => DesignType::Unknown(raw.trim().to_string()),
        }
    }
}

impl Default for DesignType {
    fn default() -> Self {
        DesignType::Unknown(String::new())
    }
}

impl From<String> for DesignType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<DesignType> for String {
    fn from(kind: DesignType) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for DesignType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bibliographic data and identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialMetadata {
    /// Paper title
    pub title: String,

    /// Trial acronym or name
    pub trial_name: Option<String>,

    /// Author names
    pub authors: Vec<String>,

    /// Journal name
    pub journal: Option<String>,

    /// Publication year
    pub year: Option<i64>,

    /// DOI without URL prefix
    pub doi: Option<String>,

    /// Registry number (e.g. NCT id)
    pub registry_number: Option<String>,

    /// Study type as stated in the paper
    pub study_type: Option<String>,
}

/// Study design, population and intervention
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyDesign {
    /// Design classification
    pub design_type: DesignType,

    /// Total enrolled population
    pub population_size: Option<i64>,

    /// Intervention description
    pub intervention: Option<String>,

    /// Comparator description
    pub comparator: Option<String>,

    /// Follow-up period
    pub follow_up: Option<String>,

    /// Study duration
    pub duration: Option<String>,

    /// Primary outcome names declared in the methods
    pub primary_outcome_names: Vec<String>,
}

/// Background section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Background {
    /// Background narrative
    pub background: String,

    /// Research question
    pub research_question: Option<String>,
}

/// Narrative results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsSummary {
    /// Main finding in one sentence
    pub main_finding: String,

    /// Additional key results
    pub key_results: Vec<String>,

    /// Adverse event notes
    pub adverse_events: Vec<String>,
}

/// Limitations section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limitations {
    /// Limitation statements
    pub limitations: Vec<String>,

    /// Bias risks
    pub bias_risks: Vec<String>,

    /// Generalizability statement
    pub generalizability: Option<String>,
}

/// Outcomes split into independent-length partitions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSet {
    /// Primary outcomes
    pub primary: Vec<Outcome>,

    /// Secondary outcomes
    pub secondary: Vec<Outcome>,

    /// Exploratory outcomes
    pub exploratory: Vec<Outcome>,
}

impl OutcomeSet {
    /// Append an outcome to a partition
    pub fn push(&mut self, partition: OutcomePartition, outcome: Outcome) {
        match partition {
            OutcomePartition::Primary => self.primary.push(outcome),
            OutcomePartition::Secondary => self.secondary.push(outcome),
            OutcomePartition::Exploratory => self.exploratory.push(outcome),
        }
    }

    /// Iterate all outcomes with their partition and index within it
    pub fn iter(&self) -> impl Iterator<Item = (OutcomePartition, usize, &Outcome)> {
        tagged(OutcomePartition::Primary, &self.primary)
            .chain(tagged(OutcomePartition::Secondary, &self.secondary))
            .chain(tagged(OutcomePartition::Exploratory, &self.exploratory))
    }

    /// Total number of outcomes across partitions
    pub fn len(&self) -> usize {
        self.primary.len() + self.secondary.len() + self.exploratory.len()
    }

    /// Whether there are no outcomes at all
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn tagged(
    partition: OutcomePartition,
    list: &[Outcome],
) -> impl Iterator<Item = (OutcomePartition, usize, &Outcome)> {
    list.iter()
        .enumerate()
        .map(move |(idx, outcome)| (partition, idx, outcome))
}

/// Aggregate result of one extraction run
///
/// Every list may hold any number of elements, including zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSummary {
    /// Layout version of this structure
    pub schema_version: u32,

    /// Bibliographic data
    pub metadata: TrialMetadata,

    /// Design and population
    pub design: StudyDesign,

    /// Background section
    pub background: Background,

    /// Narrative results
    pub results: ResultsSummary,

    /// Outcome measures
    pub outcomes: OutcomeSet,

    /// Treatment arms
    pub arms: Vec<Arm>,

    /// Safety events
    pub safety_events: Vec<SafetyEvent>,

    /// Limitations
    pub limitations: Limitations,

    /// Conclusions
    pub conclusions: Vec<String>,
}

impl Default for TrialSummary {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            metadata: TrialMetadata::default(),
            design: StudyDesign::default(),
            background: Background::default(),
            results: ResultsSummary::default(),
            outcomes: OutcomeSet::default(),
            arms: Vec::new(),
            safety_events: Vec::new(),
            limitations: Limitations::default(),
            conclusions: Vec::new(),
        }
    }
}

impl TrialSummary {
    /// Find an arm by label (case-insensitive)
    pub fn arm(&self, label: &str) -> Option<&Arm> {
        self.arms.iter().find(|arm| arm.matches_label(label))
    }
}
