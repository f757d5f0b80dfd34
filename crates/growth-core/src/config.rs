//! Ranking and application configuration
//!
//! Every field has a default matching the production tuning, so an empty or
//! partial YAML file is valid.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::similarity::MAX_SCORE;
use crate::{Error, Result};

/// How a missing trend measurement compares against the other run's trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullTrendPolicy {
    /// Missing data classifies like a measured zero change
    #[default]
    SameAsZero,
    /// A missing measurement on either side never earns trend points
    Unmatched,
}

/// Tuning for the pairwise similarity score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    pub null_trends: NullTrendPolicy,
}

/// Tuning for the similar-case ranking pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Most recent same-industry runs considered per request
    pub candidate_limit: usize,
    /// Candidates scoring below this are dropped as noise
    pub min_score: u8,
    /// Maximum number of similar cases returned
    pub max_results: usize,
    pub similarity: SimilarityConfig,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            candidate_limit: 50,
            min_score: 20,
            max_results: 3,
            similarity: SimilarityConfig::default(),
        }
    }
}

impl RankingConfig {
    /// Reject tuning that could never return a case
    pub fn validate(&self) -> Result<()> {
        if self.candidate_limit == 0 {
            return Err(Error::Config(
                "ranking.candidate_limit must be at least 1".to_string(),
            ));
        }
        if self.max_results == 0 {
            return Err(Error::Config(
                "ranking.max_results must be at least 1".to_string(),
            ));
        }
        if self.min_score > MAX_SCORE {
            return Err(Error::Config(format!(
                "ranking.min_score must be at most {}",
                MAX_SCORE
            )));
        }
        Ok(())
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ranking: RankingConfig,
}

impl AppConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.ranking.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&contents)?;
        tracing::debug!(path = %path.display(), ?config, "Loaded configuration");
        Ok(config)
    }
}
