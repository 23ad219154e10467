//! Validator configuration

use serde::{Deserialize, Serialize};

/// Configuration for validation rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// p-values, percentages, counts and interval levels inside their domains
    pub check_ranges: bool,

    /// Confidence interval ordering and estimate placement
    pub check_intervals: bool,

    /// Ratio measures positive and inside `[ratio_min, ratio_max]`
    pub check_ratio_plausibility: bool,

    /// Allocated >= analyzed >= completed for every arm
    pub check_arm_consistency: bool,

    /// Population size positive, plausible and consistent with arm allocation
    pub check_population: bool,

    /// Safety incidence refers to known arms and stays within allocation
    pub check_safety_cross_reference: bool,

    /// Classified measures carry an estimate; unclassified labels are reported
    pub check_completeness: bool,

    /// Scan statistics quoted in the main finding
    pub scan_free_text: bool,

    /// Smallest plausible ratio estimate
    pub ratio_min: f64,

    /// Largest plausible ratio estimate
    pub ratio_max: f64,

    /// Largest plausible trial population
    pub max_plausible_population: i64,

    /// Relative difference tolerated between population size and arm allocation sum
    pub allocation_tolerance: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            check_ranges: true,
            check_intervals: true,
            check_ratio_plausibility: true,
            check_arm_consistency: true,
            check_population: true,
            check_safety_cross_reference: true,
            check_completeness: true,
            scan_free_text: true,
            ratio_min: 0.01,
            ratio_max: 10.0,
            max_plausible_population: 1_000_000,
            allocation_tolerance: 0.05,
        }
    }
}

impl ValidationConfig {
    /// Create a permissive configuration (hard domain errors only)
    pub fn permissive() -> Self {
        Self {
            check_ranges: true,
            check_intervals: true,
            check_ratio_plausibility: false,
            check_arm_consistency: false,
            check_population: false,
            check_safety_cross_reference: false,
            check_completeness: false,
            scan_free_text: false,
            ratio_min: 0.0,
            ratio_max: f64::MAX,
            max_plausible_population: i64::MAX,
            allocation_tolerance: 1.0,
        }
    }

    /// Create a strict configuration (all checks, tighter plausibility bounds)
    pub fn strict() -> Self {
        Self {
            ratio_min: 0.05,
            ratio_max: 5.0,
            max_plausible_population: 100_000,
            allocation_tolerance: 0.0,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ValidationConfig::default();
        assert!(config.check_ranges);
        assert!(config.scan_free_text);
        assert_eq!(config.ratio_min, 0.01);
        assert_eq!(config.ratio_max, 10.0);
        assert_eq!(config.max_plausible_population, 1_000_000);
    }

    #[test]
    fn test_permissive_config() {
        let config = ValidationConfig::permissive();
        assert!(config.check_ranges);
        assert!(!config.check_completeness);
        assert!(!config.scan_free_text);
    }

    #[test]
    fn test_strict_config() {
        let config = ValidationConfig::strict();
        assert!(config.check_population);
        assert_eq!(config.ratio_max, 5.0);
        assert_eq!(config.allocation_tolerance, 0.0);
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: ValidationConfig =
            serde_json::from_str(r#"{"scan_free_text": false}"#).unwrap();
        assert!(!config.scan_free_text);
        assert!(config.check_ranges);
        assert_eq!(config.ratio_max, 10.0);
    }
}
