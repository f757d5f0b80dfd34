//! Pairwise similarity between analysis runs
//!
//! A fixed additive point budget over the structured classification of two
//! runs. Points per signal:
//!
//! | Signal                          | Points            |
//! |---------------------------------|-------------------|
//! | Same primary bottleneck         | 35                |
//! | Shared secondary bottlenecks    | 10 each, max 2    |
//! | Confidence within 0.15 / 0.30   | 20 / 8            |
//! | ROAS / CTR / CVR trend sign     | 8 / 8 / 9         |
//!
//! The budget sums to exactly 100; the result is still capped at 100.

use serde::Serialize;

use crate::config::{NullTrendPolicy, SimilarityConfig};
use crate::Run;

pub const MAX_SCORE: u8 = 100;

const PRIMARY_MATCH_POINTS: u32 = 35;
const SECONDARY_MATCH_POINTS: u32 = 10;
const MAX_SECONDARY_MATCHES: usize = 2;
const CONFIDENCE_CLOSE: f64 = 0.15;
const CONFIDENCE_CLOSE_POINTS: u32 = 20;
const CONFIDENCE_NEAR: f64 = 0.30;
const CONFIDENCE_NEAR_POINTS: u32 = 8;
const ROAS_TREND_POINTS: u32 = 8;
const CTR_TREND_POINTS: u32 = 8;
const CVR_TREND_POINTS: u32 = 9;

/// Direction of a trend delta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendSign {
    Negative,
    Flat,
    Positive,
}

/// Classify a trend delta. Missing data lands in `Flat`, same as an exact
/// zero.
pub fn trend_sign(delta: Option<f64>) -> TrendSign {
    match delta {
        Some(v) if v > 0.0 => TrendSign::Positive,
        Some(v) if v < 0.0 => TrendSign::Negative,
        _ => TrendSign::Flat,
    }
}

/// Points earned per signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScoreBreakdown {
    pub primary: u32,
    pub secondary: u32,
    pub confidence: u32,
    pub roas_trend: u32,
    pub ctr_trend: u32,
    pub cvr_trend: u32,
}

impl ScoreBreakdown {
    /// Sum of all signals, capped at [`MAX_SCORE`]
    pub fn total(&self) -> u8 {
        let sum = self.primary
            + self.secondary
            + self.confidence
            + self.roas_trend
            + self.ctr_trend
            + self.cvr_trend;
        sum.min(u32::from(MAX_SCORE)) as u8
    }
}

/// Scores how closely a historical run resembles a target run
#[derive(Debug, Clone, Default)]
pub struct SimilarityScorer {
    config: SimilarityConfig,
}

impl SimilarityScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SimilarityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    /// Similarity of `candidate` to `target`, in [0, 100]
    pub fn score(&self, target: &Run, candidate: &Run) -> u8 {
        self.breakdown(target, candidate).total()
    }

    /// Per-signal points for a pair of runs
    pub fn breakdown(&self, target: &Run, candidate: &Run) -> ScoreBreakdown {
        let primary = if target.primary_bottleneck == candidate.primary_bottleneck {
            PRIMARY_MATCH_POINTS
        } else {
            0
        };

        // Counted over the target's list, so a duplicated entry there counts twice
        let shared = target
            .secondary_bottlenecks
            .iter()
            .filter(|b| candidate.secondary_bottlenecks.contains(b))
            .count();
        let secondary = shared.min(MAX_SECONDARY_MATCHES) as u32 * SECONDARY_MATCH_POINTS;

        let confidence_diff = (target.confidence - candidate.confidence).abs();
        let confidence = if confidence_diff <= CONFIDENCE_CLOSE {
            CONFIDENCE_CLOSE_POINTS
        } else if confidence_diff <= CONFIDENCE_NEAR {
            CONFIDENCE_NEAR_POINTS
        } else {
            0
        };

        let (t, c) = (&target.trends, &candidate.trends);
        ScoreBreakdown {
            primary,
            secondary,
            confidence,
            roas_trend: self.trend_points(t.roas_delta, c.roas_delta, ROAS_TREND_POINTS),
            ctr_trend: self.trend_points(t.ctr_delta, c.ctr_delta, CTR_TREND_POINTS),
            cvr_trend: self.trend_points(t.cvr_delta, c.cvr_delta, CVR_TREND_POINTS),
        }
    }

    fn trend_points(&self, target: Option<f64>, candidate: Option<f64>, points: u32) -> u32 {
        let comparable = match self.config.null_trends {
            NullTrendPolicy::SameAsZero => true,
            NullTrendPolicy::Unmatched => target.is_some() && candidate.is_some(),
        };

        if comparable && trend_sign(target) == trend_sign(candidate) {
            points
        } else {
            0
        }
    }
}
