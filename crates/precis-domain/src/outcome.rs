//! Outcome measures

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of effect or outcome measure
///
/// Values that do not match a known kind are kept as `Unknown(raw)` so the
/// fact that a measure was reported survives even when it cannot be classified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MeasureKind {
    /// Hazard ratio
    HazardRatio,
    /// Odds ratio
    OddsRatio,
    /// Relative risk / risk ratio
    RelativeRisk,
    /// Absolute risk difference
    RiskDifference,
    /// Difference in means
    MeanDifference,
    /// Standardized mean difference
    StandardizedMeanDifference,
    /// Event rate
    EventRate,
    /// Response rate
    ResponseRate,
    /// Plain percentage
    Percentage,
    /// Continuous measure
    Continuous,
    /// Change from baseline
    ChangeFromBaseline,
    /// Area under the curve
    Auc,
    /// Maximum concentration
    Cmax,
    /// Time to maximum concentration
    Tmax,
    /// Elimination half-life
    HalfLife,
    /// Clearance
    Clearance,
    /// Survival rate
    SurvivalRate,
    /// Median survival
    MedianSurvival,
    /// Unclassified measure (raw label preserved)
    Unknown(String),
}

impl MeasureKind {
    /// Canonical identifier
    pub fn as_str(&self) -> &str {
        match self {
            MeasureKind::HazardRatio => "hazard_ratio",
            MeasureKind::OddsRatio => "odds_ratio",
            MeasureKind::RelativeRisk => "relative_risk",
            MeasureKind::RiskDifference => "risk_difference",
            MeasureKind::MeanDifference => "mean_difference",
            MeasureKind::StandardizedMeanDifference => "standardized_mean_difference",
            MeasureKind::EventRate => "event_rate",
            MeasureKind::ResponseRate => "response_rate",
            MeasureKind::Percentage => "percentage",
            MeasureKind::Continuous => "continuous",
            MeasureKind::ChangeFromBaseline => "change_from_baseline",
            MeasureKind::Auc => "auc",
            MeasureKind::Cmax => "cmax",
            MeasureKind::Tmax => "tmax",
            MeasureKind::HalfLife => "half_life",
            MeasureKind::Clearance => "clearance",
            MeasureKind::SurvivalRate => "survival_rate",
            MeasureKind::MedianSurvival => "median_survival",
            MeasureKind::Unknown(raw) => raw,
        }
    }

    /// Classify a raw label, falling back to `Unknown`
    ///
    /// Matching ignores case, spaces and hyphens, and accepts the usual
    /// abbreviations (HR, OR, RR, MD, SMD).
    pub fn parse(raw: &str) -> Self {
        let key: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();

        match key.as_str() {
            "hazard_ratio" | "hr" => MeasureKind::HazardRatio,
            "odds_ratio" | "or" => MeasureKind::OddsRatio,
            "relative_risk" | "risk_ratio" | "rr" => MeasureKind::RelativeRisk,
            "risk_difference" | "absolute_risk_difference" | "rd" => MeasureKind::RiskDifference,
            "mean_difference" | "md" => MeasureKind::MeanDifference,
            "standardized_mean_difference" | "smd" => MeasureKind::StandardizedMeanDifference,
            "event_rate" => MeasureKind::EventRate,
            "response_rate" => MeasureKind::ResponseRate,
            "percentage" | "percent" => MeasureKind::Percentage,
            "continuous" => MeasureKind::Continuous,
            "change_from_baseline" => MeasureKind::ChangeFromBaseline,
            "auc" => MeasureKind::Auc,
            "cmax" => MeasureKind::Cmax,
            "tmax" => MeasureKind::Tmax,
            "half_life" => MeasureKind::HalfLife,
            "clearance" => MeasureKind::Clearance,
            "survival_rate" => MeasureKind::SurvivalRate,
            "median_survival" => MeasureKind::MedianSurvival,
            _ => MeasureKind::Unknown(raw.trim().to_string()),
        }
    }

    /// Whether the measure is a ratio (must be strictly positive)
    pub fn is_ratio(&self) -> bool {
        matches!(
            self,
            MeasureKind::HazardRatio | MeasureKind::OddsRatio | MeasureKind::RelativeRisk
        )
    }

    /// Whether the measure was classified
    pub fn is_known(&self) -> bool {
        !matches!(self, MeasureKind::Unknown(_))
    }
}

impl Default for MeasureKind {
    fn default() -> Self {
        MeasureKind::Unknown(String::new())
    }
}

impl From<String> for MeasureKind {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<MeasureKind> for String {
    fn from(kind: MeasureKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for MeasureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence interval around an estimate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Lower bound
    pub lower: Option<f64>,

    /// Upper bound
    pub upper: Option<f64>,

    /// Confidence level as a fraction (0.95 for 95%)
    pub level: Option<f64>,
}

/// Which outcome list an outcome belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomePartition {
    /// Primary endpoints
    Primary,
    /// Secondary endpoints
    Secondary,
    /// Exploratory endpoints
    Exploratory,
}

impl OutcomePartition {
    /// Partition name
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomePartition::Primary => "primary",
            OutcomePartition::Secondary => "secondary",
            OutcomePartition::Exploratory => "exploratory",
        }
    }

    /// Parse a partition label
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "primary" => Some(OutcomePartition::Primary),
            "secondary" => Some(OutcomePartition::Secondary),
            "exploratory" | "tertiary" => Some(OutcomePartition::Exploratory),
            _ => None,
        }
    }
}

/// One reported outcome measure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Outcome name
    pub name: String,

    /// Measure kind
    pub measure: MeasureKind,

    /// Point estimate
    pub estimate: Option<f64>,

    /// Confidence interval
    pub confidence_interval: Option<ConfidenceInterval>,

    /// P-value (kept as reported, even when out of range)
    pub p_value: Option<f64>,

    /// Units
    pub units: Option<String>,

    /// Outcome definition
    pub definition: Option<String>,

    /// Primary endpoint flag
    pub is_primary: bool,
}
