//! Facets - the fixed set of specialized extraction categories

use serde::{Deserialize, Serialize};
use std::fmt;

/// One specialized category of information to extract
///
/// The declaration order is the registry order: results are always
/// aggregated and reported in this order, never in completion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    /// Bibliographic data and identifiers
    Metadata,

    /// Background and research question
    Background,

    /// Study design, population and intervention
    Design,

    /// Narrative results
    Results,

    /// Limitations and bias risks
    Limitations,

    /// Outcome measures with estimates
    Outcomes,

    /// Treatment arms and allocation counts
    Arms,

    /// Adverse and safety events
    SafetyEvents,
}

impl Facet {
    /// Every facet, in registry order
    pub const ALL: [Facet; 8] = [
        Facet::Metadata,
        Facet::Background,
        Facet::Design,
        Facet::Results,
        Facet::Limitations,
        Facet::Outcomes,
        Facet::Arms,
        Facet::SafetyEvents,
    ];

    /// Stable task identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Facet::Metadata => "metadata",
            Facet::Background => "background",
            Facet::Design => "design",
            Facet::Results => "results",
            Facet::Limitations => "limitations",
            Facet::Outcomes => "outcomes",
            Facet::Arms => "arms",
            Facet::SafetyEvents => "safety_events",
        }
    }

    /// Parse a facet from its identifier
    pub fn parse(s: &str) -> Option<Self> {
        let id = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|f| f.as_str() == id)
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order_is_sorted_order() {
        let mut sorted = Facet::ALL;
        sorted.sort();
        assert_eq!(sorted, Facet::ALL);
    }

    #[test]
    fn test_parse_round_trip() {
        for facet in Facet::ALL {
            assert_eq!(Facet::parse(facet.as_str()), Some(facet));
        }
        assert_eq!(Facet::parse("unknown"), None);
    }
}
