//! Precis Validator
//!
//! Advisory quality checks over an assembled [`TrialSummary`].
//!
//! The validator provides:
//! - Numeric range checks (p-values, percentages, counts, interval levels)
//! - Confidence interval ordering and estimate placement
//! - Ratio-measure plausibility
//! - Arm, population and safety cross-checks
//! - Completeness and classification hints
//! - A scan of quoted statistics in the main finding
//!
//! Validation never changes the summary and never blocks a result; it only
//! reports [`ValidationIssue`]s.
//!
//! # Examples
//!
//! ```
//! use precis_domain::{Outcome, TrialSummary};
//! use precis_validator::{IssueKind, ValidationConfig, Validator};
//!
//! let mut summary = TrialSummary::default();
//! summary.outcomes.secondary.push(Outcome {
//!     p_value: Some(1.5),
//!     ..Outcome::default()
//! });
//!
//! let validator = Validator::new(ValidationConfig::default());
//! let issues = validator.validate(&summary);
//! assert_eq!(issues.len(), 1);
//! assert_eq!(issues[0].kind, IssueKind::OutOfRange);
//! ```
//!
//! [`TrialSummary`]: precis_domain::TrialSummary

#![warn(missing_docs)]

mod config;
mod issue;
mod validator;

pub use config::ValidationConfig;
pub use issue::{EntityRef, IssueKind, Severity, ValidationIssue};
pub use validator::Validator;
