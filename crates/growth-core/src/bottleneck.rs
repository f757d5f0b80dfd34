//! Bottleneck classification
//!
//! Every analysis names one primary growth constraint and any number of
//! secondary ones, all drawn from the same four categories. Experiments are
//! tagged with the category they target.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Growth constraint category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bottleneck {
    /// Ad fatigue, low CTR, stale creative
    Creative,
    /// Post-click friction: landing page, checkout, CVR/AOV
    Conversion,
    /// Audience saturation, CPM inflation, ROAS decay at scale
    Scaling,
    /// CAC too high, poor LTV:CAC, sub-optimal channel mix
    Efficiency,
}

impl Bottleneck {
    pub const ALL: [Bottleneck; 4] = [
        Bottleneck::Creative,
        Bottleneck::Conversion,
        Bottleneck::Scaling,
        Bottleneck::Efficiency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creative => "Creative",
            Self::Conversion => "Conversion",
            Self::Scaling => "Scaling",
            Self::Efficiency => "Efficiency",
        }
    }
}

impl FromStr for Bottleneck {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "creative" => Ok(Self::Creative),
            "conversion" => Ok(Self::Conversion),
            "scaling" => Ok(Self::Scaling),
            "efficiency" => Ok(Self::Efficiency),
            _ => Err(crate::Error::Parse(format!("Invalid bottleneck: {}", s))),
        }
    }
}

impl std::fmt::Display for Bottleneck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bottleneck_roundtrip() {
        for bottleneck in Bottleneck::ALL {
            let parsed = Bottleneck::from_str(bottleneck.as_str()).unwrap();
            assert_eq!(bottleneck, parsed);
        }
    }

    #[test]
    fn test_bottleneck_parse_is_case_insensitive() {
        assert_eq!(Bottleneck::from_str("SCALING").unwrap(), Bottleneck::Scaling);
        assert!(Bottleneck::from_str("Retention").is_err());
    }

    #[test]
    fn test_bottleneck_serializes_as_display_name() {
        let json = serde_json::to_string(&Bottleneck::Efficiency).unwrap();
        assert_eq!(json, "\"Efficiency\"");
    }
}
