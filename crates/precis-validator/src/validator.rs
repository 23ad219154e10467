//! Trial summary validation logic

use crate::{EntityRef, IssueKind, Severity, ValidationConfig, ValidationIssue};
use precis_domain::{
    Arm, DesignType, MappingNote, MeasureKind, NoteAction, Outcome, SafetyEvent, TrialSummary,
};
use regex::Regex;
use tracing::debug;

/// Patterns for statistics quoted in prose
#[derive(Debug, Clone)]
struct TextPatterns {
    hazard_ratio: Regex,
    p_value: Regex,
    percent: Regex,
}

impl TextPatterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            hazard_ratio: Regex::new(
                r"(?i)\b(?:hr|hazard\s+ratio)\b\s*(?:of|was|=|:|,)?\s*(-?\d+(?:\.\d+)?)",
            )?,
            p_value: Regex::new(r"(?i)\bp\s*(?:=|<|>|≤|≥|<=|>=)\s*(-?\d*\.?\d+)")?,
            percent: Regex::new(r"(-?\d+(?:\.\d+)?)\s*%")?,
        })
    }
}

/// The validator checks an assembled summary and reports what looks wrong
///
/// Validation is pure: the same summary always yields the same issues in the
/// same order, and the summary is never modified.
#[derive(Debug, Clone)]
pub struct Validator {
    config: ValidationConfig,
    patterns: Option<TextPatterns>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

impl Validator {
    /// Create a new validator with the given configuration
    pub fn new(config: ValidationConfig) -> Self {
        let patterns = TextPatterns::compile().ok();
        Self { config, patterns }
    }

    /// Active configuration
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate a summary against the configured rules
    pub fn validate(&self, summary: &TrialSummary) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        for (partition, index, outcome) in summary.outcomes.iter() {
            let entity = EntityRef::Outcome {
                partition,
                index,
                name: outcome.name.clone(),
            };
            self.check_outcome(outcome, &entity, &mut issues);
        }

        for (index, arm) in summary.arms.iter().enumerate() {
            let entity = EntityRef::Arm {
                index,
                label: arm.label.clone(),
            };
            self.check_arm(arm, &entity, &mut issues);
        }

        for (index, event) in summary.safety_events.iter().enumerate() {
            self.check_safety_event(summary, index, event, &mut issues);
        }

        if self.config.check_population {
            self.check_population(summary, &mut issues);
        }

        if self.config.check_completeness {
            if let DesignType::Unknown(raw) = &summary.design.design_type {
                if !raw.is_empty() {
                    issues.push(ValidationIssue::new(
                        Severity::Info,
                        IssueKind::Unclassified,
                        format!("Study design '{}' is not a recognised design type", raw),
                        Some(EntityRef::Design),
                    ));
                }
            }
        }

        if self.config.scan_free_text {
            self.scan_main_finding(&summary.results.main_finding, &mut issues);
        }

        debug!(issues = issues.len(), "validation finished");
        issues
    }

    /// Turn mapper coercion notes into informational issues
    pub fn advisories(&self, notes: &[MappingNote]) -> Vec<ValidationIssue> {
        notes
            .iter()
            .filter(|note| note.action != NoteAction::Unclassified)
            .map(|note| {
                ValidationIssue::new(
                    Severity::Info,
                    IssueKind::Coercion,
                    format!("{}: {}", note.action.as_str(), note.detail),
                    Some(EntityRef::Field {
                        facet: note.facet,
                        path: note.path.clone(),
                    }),
                )
            })
            .collect()
    }

    fn check_outcome(&self, outcome: &Outcome, entity: &EntityRef, issues: &mut Vec<ValidationIssue>) {
        let issue = |severity, kind, message: String| {
            ValidationIssue::new(severity, kind, message, Some(entity.clone()))
        };

        if self.config.check_ranges {
            if let Some(p) = outcome.p_value {
                if !(0.0..=1.0).contains(&p) {
                    issues.push(issue(
                        Severity::Error,
                        IssueKind::OutOfRange,
                        format!("p-value {} is outside [0, 1]", p),
                    ));
                }
            }
            if let Some(level) = outcome.confidence_interval.as_ref().and_then(|ci| ci.level) {
                if !(level > 0.0 && level <= 1.0) {
                    issues.push(issue(
                        Severity::Error,
                        IssueKind::OutOfRange,
                        format!("Confidence level {} is outside (0, 1]", level),
                    ));
                }
            }
        }

        if self.config.check_intervals {
            if let Some(ci) = &outcome.confidence_interval {
                if let (Some(lower), Some(upper)) = (ci.lower, ci.upper) {
                    if lower > upper {
                        issues.push(issue(
                            Severity::Error,
                            IssueKind::InvalidInterval,
                            format!("Confidence interval lower bound {} exceeds upper bound {}", lower, upper),
                        ));
                    } else if let Some(estimate) = outcome.estimate {
                        if estimate < lower || estimate > upper {
                            issues.push(issue(
                                Severity::Warning,
                                IssueKind::EstimateOutsideInterval,
                                format!(
                                    "Estimate {} lies outside its confidence interval [{}, {}]",
                                    estimate, lower, upper
                                ),
                            ));
                        }
                    }
                }
            }
        }

        if self.config.check_ratio_plausibility && outcome.measure.is_ratio() {
            if let Some(estimate) = outcome.estimate {
                if estimate <= 0.0 {
                    issues.push(issue(
                        Severity::Error,
                        IssueKind::OutOfRange,
                        format!("{} must be positive, got {}", outcome.measure, estimate),
                    ));
                } else if estimate < self.config.ratio_min || estimate > self.config.ratio_max {
                    issues.push(issue(
                        Severity::Warning,
                        IssueKind::ImplausibleValue,
                        format!(
                            "{} {} is outside the plausible range [{}, {}]",
                            outcome.measure, estimate, self.config.ratio_min, self.config.ratio_max
                        ),
                    ));
                }
            }
        }

        if self.config.check_completeness {
            match &outcome.measure {
                MeasureKind::Unknown(raw) if !raw.is_empty() => issues.push(issue(
                    Severity::Info,
                    IssueKind::Unclassified,
                    format!("Measure '{}' is not a recognised measure type", raw),
                )),
                measure if measure.is_known() && outcome.estimate.is_none() => {
                    issues.push(issue(
                        Severity::Warning,
                        IssueKind::Incomplete,
                        format!("{} reported without an estimate", measure),
                    ))
                }
                _ => {}
            }
        }
    }

    fn check_arm(&self, arm: &Arm, entity: &EntityRef, issues: &mut Vec<ValidationIssue>) {
        let counts = [
            ("allocated", arm.allocated),
            ("analyzed", arm.analyzed),
            ("completed", arm.completed),
        ];

        if self.config.check_ranges {
            for (name, value) in counts {
                if let Some(value) = value.filter(|v| *v < 0) {
                    issues.push(ValidationIssue::new(
                        Severity::Error,
                        IssueKind::OutOfRange,
                        format!("Arm {} count {} is negative", name, value),
                        Some(entity.clone()),
                    ));
                }
            }
        }

        if self.config.check_arm_consistency {
            let present: Vec<(&str, i64)> = counts
                .iter()
                .filter_map(|(name, value)| value.map(|v| (*name, v)))
                .collect();
            for pair in present.windows(2) {
                let (earlier, earlier_count) = pair[0];
                let (later, later_count) = pair[1];
                if later_count > earlier_count {
                    issues.push(ValidationIssue::new(
                        Severity::Warning,
                        IssueKind::ArmInconsistency,
                        format!(
                            "Arm {} count {} exceeds {} count {}",
                            later, later_count, earlier, earlier_count
                        ),
                        Some(entity.clone()),
                    ));
                }
            }
        }
    }

    fn check_safety_event(
        &self,
        summary: &TrialSummary,
        index: usize,
        event: &SafetyEvent,
        issues: &mut Vec<ValidationIssue>,
    ) {
        for (label, incidence) in &event.incidence {
            let entity = || EntityRef::SafetyEvent {
                index,
                name: event.name.clone(),
                arm: Some(label.clone()),
            };

            if self.config.check_ranges {
                if let Some(percent) = incidence.percent {
                    if !(0.0..=100.0).contains(&percent) {
                        issues.push(ValidationIssue::new(
                            Severity::Error,
                            IssueKind::OutOfRange,
                            format!("Incidence {}% is outside [0, 100]", percent),
                            Some(entity()),
                        ));
                    }
                }
                if let Some(count) = incidence.count.filter(|c| *c < 0) {
                    issues.push(ValidationIssue::new(
                        Severity::Error,
                        IssueKind::OutOfRange,
                        format!("Incidence count {} is negative", count),
                        Some(entity()),
                    ));
                }
            }

            if !self.config.check_safety_cross_reference || summary.arms.is_empty() {
                continue;
            }
            match summary.arm(label) {
                None => issues.push(ValidationIssue::new(
                    Severity::Info,
                    IssueKind::SafetyCrossReference,
                    format!("Incidence reported for arm '{}' which is not among the extracted arms", label),
                    Some(entity()),
                )),
                Some(arm) => {
                    if let (Some(count), Some(allocated)) = (incidence.count, arm.allocated) {
                        if allocated >= 0 && count > allocated {
                            issues.push(ValidationIssue::new(
                                Severity::Warning,
                                IssueKind::SafetyCrossReference,
                                format!(
                                    "{} participants with the event exceed the {} allocated to '{}'",
                                    count, allocated, arm.label
                                ),
                                Some(entity()),
                            ));
                        }
                    }
                }
            }
        }
    }

    fn check_population(&self, summary: &TrialSummary, issues: &mut Vec<ValidationIssue>) {
        let Some(population) = summary.design.population_size else {
            return;
        };

        if population <= 0 {
            issues.push(ValidationIssue::new(
                Severity::Error,
                IssueKind::OutOfRange,
                format!("Population size {} must be positive", population),
                Some(EntityRef::Design),
            ));
            return;
        }

        if population > self.config.max_plausible_population {
            issues.push(ValidationIssue::new(
                Severity::Warning,
                IssueKind::ImplausibleValue,
                format!(
                    "Population size {} exceeds {}",
                    population, self.config.max_plausible_population
                ),
                Some(EntityRef::Design),
            ));
        }

        let allocations: Option<Vec<i64>> = summary.arms.iter().map(|arm| arm.allocated).collect();
        let Some(allocations) = allocations.filter(|a| !a.is_empty()) else {
            return;
        };
        // Widened so any number of i64 counts sums without overflow
        let total: i128 = allocations.iter().map(|&n| i128::from(n)).sum();
        let difference = (total - i128::from(population)).unsigned_abs() as f64;
        if difference > self.config.allocation_tolerance * population as f64 {
            issues.push(ValidationIssue::new(
                Severity::Warning,
                IssueKind::PopulationMismatch,
                format!(
                    "Arms allocate {} participants but the population size is {}",
                    total, population
                ),
                Some(EntityRef::Design),
            ));
        }
    }

    fn scan_main_finding(&self, text: &str, issues: &mut Vec<ValidationIssue>) {
        let Some(patterns) = &self.patterns else {
            return;
        };
        if text.trim().is_empty() {
            return;
        }

        let quoted = |re: &Regex| -> Vec<f64> {
            re.captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .filter_map(|m| m.as_str().parse::<f64>().ok())
                .collect()
        };

        for hr in quoted(&patterns.hazard_ratio) {
            if hr <= 0.0 || hr < self.config.ratio_min || hr > self.config.ratio_max {
                issues.push(ValidationIssue::new(
                    Severity::Warning,
                    IssueKind::ImplausibleValue,
                    format!("Main finding quotes an implausible hazard ratio {}", hr),
                    Some(EntityRef::MainFinding),
                ));
            }
        }
        for p in quoted(&patterns.p_value) {
            if !(0.0..=1.0).contains(&p) {
                issues.push(ValidationIssue::new(
                    Severity::Warning,
                    IssueKind::OutOfRange,
                    format!("Main finding quotes a p-value {} outside [0, 1]", p),
                    Some(EntityRef::MainFinding),
                ));
            }
        }
        for percent in quoted(&patterns.percent) {
            if !(0.0..=100.0).contains(&percent) {
                issues.push(ValidationIssue::new(
                    Severity::Warning,
                    IssueKind::OutOfRange,
                    format!("Main finding quotes a percentage {}% outside [0, 100]", percent),
                    Some(EntityRef::MainFinding),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use precis_domain::{ConfidenceInterval, Facet, Incidence};
    use proptest::prelude::*;

    fn outcome(measure: MeasureKind, estimate: Option<f64>) -> Outcome {
        Outcome {
            name: "overall survival".to_string(),
            measure,
            estimate,
            ..Outcome::default()
        }
    }

    fn arm(label: &str, allocated: Option<i64>, analyzed: Option<i64>, completed: Option<i64>) -> Arm {
        Arm {
            label: label.to_string(),
            allocated,
            analyzed,
            completed,
            description: None,
        }
    }

    fn kinds(issues: &[ValidationIssue]) -> Vec<IssueKind> {
        issues.iter().map(|i| i.kind).collect()
    }

    #[test]
    fn test_empty_summary_is_clean() {
        let validator = Validator::default();
        assert!(validator.validate(&TrialSummary::default()).is_empty());
    }

    #[test]
    fn test_p_value_out_of_range_flagged_once_and_kept() {
        let mut summary = TrialSummary::default();
        summary.outcomes.secondary.push(Outcome {
            p_value: Some(1.5),
            ..Outcome::default()
        });

        let issues = Validator::default().validate(&summary);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Error);
        assert_eq!(issues[0].kind, IssueKind::OutOfRange);
        assert_eq!(summary.outcomes.secondary[0].p_value, Some(1.5));
    }

    #[test]
    fn test_interval_ordering() {
        let mut summary = TrialSummary::default();
        let mut reversed = outcome(MeasureKind::MeanDifference, Some(1.0));
        reversed.confidence_interval = Some(ConfidenceInterval {
            lower: Some(2.0),
            upper: Some(0.5),
            level: Some(0.95),
        });
        let mut outside = outcome(MeasureKind::MeanDifference, Some(3.0));
        outside.confidence_interval = Some(ConfidenceInterval {
            lower: Some(0.5),
            upper: Some(2.0),
            level: None,
        });
        summary.outcomes.primary.push(reversed);
        summary.outcomes.primary.push(outside);

        let issues = Validator::default().validate(&summary);
        assert_eq!(
            kinds(&issues),
            vec![IssueKind::InvalidInterval, IssueKind::EstimateOutsideInterval]
        );
    }

    #[test]
    fn test_confidence_level_domain() {
        let mut summary = TrialSummary::default();
        let mut o = outcome(MeasureKind::MeanDifference, Some(1.0));
        o.confidence_interval = Some(ConfidenceInterval {
            lower: None,
            upper: None,
            level: Some(95.0),
        });
        summary.outcomes.primary.push(o);

        let issues = Validator::default().validate(&summary);
        assert_eq!(kinds(&issues), vec![IssueKind::OutOfRange]);
    }

    #[test]
    fn test_ratio_plausibility() {
        let mut summary = TrialSummary::default();
        summary.outcomes.primary.push(outcome(MeasureKind::HazardRatio, Some(0.8)));
        summary.outcomes.primary.push(outcome(MeasureKind::HazardRatio, Some(-0.2)));
        summary.outcomes.primary.push(outcome(MeasureKind::OddsRatio, Some(25.0)));

        let issues = Validator::default().validate(&summary);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].severity, Severity::Error);
        assert_eq!(issues[1].kind, IssueKind::ImplausibleValue);

        let permissive = Validator::new(ValidationConfig::permissive()).validate(&summary);
        assert!(permissive.is_empty());
    }

    #[test]
    fn test_completeness() {
        let mut summary = TrialSummary::default();
        summary.outcomes.primary.push(outcome(MeasureKind::HazardRatio, None));
        summary
            .outcomes
            .secondary
            .push(outcome(MeasureKind::Unknown("win ratio".to_string()), Some(1.2)));

        let issues = Validator::default().validate(&summary);
        assert_eq!(kinds(&issues), vec![IssueKind::Incomplete, IssueKind::Unclassified]);
        assert_eq!(issues[1].severity, Severity::Info);
    }

    #[test]
    fn test_arm_consistency() {
        let mut summary = TrialSummary::default();
        summary.arms.push(arm("A", Some(100), Some(98), Some(90)));
        summary.arms.push(arm("B", Some(100), None, Some(120)));
        summary.arms.push(arm("C", Some(-3), None, None));

        let issues = Validator::default().validate(&summary);
        assert_eq!(
            kinds(&issues),
            vec![IssueKind::ArmInconsistency, IssueKind::OutOfRange]
        );
        assert_eq!(
            issues[0].entity,
            Some(EntityRef::Arm {
                index: 1,
                label: "B".to_string()
            })
        );
    }

    #[test]
    fn test_population_checks() {
        let mut summary = TrialSummary::default();
        summary.design.population_size = Some(0);
        assert_eq!(
            kinds(&Validator::default().validate(&summary)),
            vec![IssueKind::OutOfRange]
        );

        summary.design.population_size = Some(2_000_000);
        assert_eq!(
            kinds(&Validator::default().validate(&summary)),
            vec![IssueKind::ImplausibleValue]
        );

        summary.design.population_size = Some(200);
        summary.arms.push(arm("A", Some(100), None, None));
        summary.arms.push(arm("B", Some(100), None, None));
        assert!(Validator::default().validate(&summary).is_empty());

        summary.arms[1].allocated = Some(40);
        assert_eq!(
            kinds(&Validator::default().validate(&summary)),
            vec![IssueKind::PopulationMismatch]
        );
    }

    #[test]
    fn test_huge_allocations_do_not_overflow() {
        let mut summary = TrialSummary::default();
        summary.design.population_size = Some(100);
        summary.arms.push(arm("A", Some(i64::MAX), None, None));
        summary.arms.push(arm("B", Some(i64::MAX), None, None));

        let issues = Validator::default().validate(&summary);
        let mismatch = issues
            .iter()
            .find(|i| i.kind == IssueKind::PopulationMismatch)
            .unwrap();
        assert!(mismatch.message.contains(&(2 * i128::from(i64::MAX)).to_string()));

        summary.design.population_size = Some(i64::MAX);
        summary.arms[1].allocated = Some(i64::MIN + 1);
        Validator::new(crate::ValidationConfig::strict()).validate(&summary);
    }

    #[test]
    fn test_safety_cross_reference() {
        let mut summary = TrialSummary::default();
        summary.arms.push(arm("Placebo", Some(50), None, None));
        let mut event = SafetyEvent {
            name: "nausea".to_string(),
            ..SafetyEvent::default()
        };
        event.incidence.insert(
            "placebo".to_string(),
            Incidence {
                percent: Some(120.0),
                count: Some(60),
            },
        );
        event.incidence.insert(
            "Drug X".to_string(),
            Incidence {
                percent: Some(12.0),
                count: None,
            },
        );
        summary.safety_events.push(event);

        let issues = Validator::default().validate(&summary);
        // BTreeMap order: "Drug X" before "placebo"
        assert_eq!(
            kinds(&issues),
            vec![
                IssueKind::SafetyCrossReference,
                IssueKind::OutOfRange,
                IssueKind::SafetyCrossReference
            ]
        );
        assert_eq!(issues[0].severity, Severity::Info);
        assert_eq!(issues[2].severity, Severity::Warning);
    }

    #[test]
    fn test_main_finding_scan() {
        let mut summary = TrialSummary::default();
        summary.results.main_finding =
            "Drug X reduced mortality (HR 0.72, 95% CI 0.60-0.86; p=0.001) in 34.5% of patients"
                .to_string();
        assert!(Validator::default().validate(&summary).is_empty());

        summary.results.main_finding =
            "Hazard ratio of 14.2 with p = 1.7 and response in 140% of patients".to_string();
        let issues = Validator::default().validate(&summary);
        assert_eq!(
            kinds(&issues),
            vec![
                IssueKind::ImplausibleValue,
                IssueKind::OutOfRange,
                IssueKind::OutOfRange
            ]
        );
        assert!(issues.iter().all(|i| i.entity == Some(EntityRef::MainFinding)));
    }

    #[test]
    fn test_unclassified_design() {
        let mut summary = TrialSummary::default();
        summary.design.design_type = DesignType::Unknown("n-of-1".to_string());
        let issues = Validator::default().validate(&summary);
        assert_eq!(kinds(&issues), vec![IssueKind::Unclassified]);
    }

    #[test]
    fn test_advisories_from_notes() {
        let notes = vec![
            MappingNote {
                facet: Facet::Arms,
                path: "arms[0].n_allocated".to_string(),
                action: NoteAction::Coerced,
                detail: "\"1,200\" -> 1200".to_string(),
            },
            MappingNote {
                facet: Facet::Outcomes,
                path: "outcomes[0].measure_type".to_string(),
                action: NoteAction::Unclassified,
                detail: "win ratio".to_string(),
            },
        ];
        let issues = Validator::default().advisories(&notes);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::Coercion);
        assert_eq!(issues[0].severity, Severity::Info);
    }

    #[test]
    fn test_issue_serialization() {
        let issue = ValidationIssue::new(
            Severity::Warning,
            IssueKind::ArmInconsistency,
            "msg",
            Some(EntityRef::Arm {
                index: 0,
                label: "A".to_string(),
            }),
        );
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["kind"], "arm_inconsistency");
        assert_eq!(json["entity"]["type"], "arm");
    }

    fn arb_outcome() -> impl Strategy<Value = Outcome> {
        (
            prop::option::of(-5.0f64..50.0),
            prop::option::of(-1.0f64..2.0),
            prop::option::of((-5.0f64..5.0, -5.0f64..5.0)),
            prop::sample::select(vec!["hr", "or", "md", "percentage", "win ratio", ""]),
        )
            .prop_map(|(estimate, p_value, ci, measure)| Outcome {
                name: "o".to_string(),
                measure: MeasureKind::parse(measure),
                estimate,
                p_value,
                confidence_interval: ci.map(|(lower, upper)| ConfidenceInterval {
                    lower: Some(lower),
                    upper: Some(upper),
                    level: None,
                }),
                ..Outcome::default()
            })
    }

    fn arb_summary() -> impl Strategy<Value = TrialSummary> {
        (
            prop::collection::vec(arb_outcome(), 0..6),
            prop::collection::vec(
                (
                    prop::option::of(-10i64..500),
                    prop::option::of(-10i64..500),
                    prop::option::of(-10i64..500),
                ),
                0..4,
            ),
            prop::option::of(-10i64..2_000_000),
            "[a-zA-Z0-9 .=%]{0,60}",
        )
            .prop_map(|(outcomes, arms, population, finding)| {
                let mut summary = TrialSummary::default();
                summary.outcomes.primary = outcomes;
                summary.arms = arms
                    .into_iter()
                    .enumerate()
                    .map(|(i, (a, b, c))| arm(&format!("arm {}", i), a, b, c))
                    .collect();
                summary.design.population_size = population;
                summary.results.main_finding = finding;
                summary
            })
    }

    proptest! {
        #[test]
        fn prop_validation_is_idempotent_and_pure(summary in arb_summary()) {
            let validator = Validator::new(ValidationConfig::strict());
            let before = summary.clone();
            let first = validator.validate(&summary);
            let second = validator.validate(&summary);
            prop_assert_eq!(first, second);
            prop_assert_eq!(before, summary);
        }
    }
}
