//! Analysis runs
//!
//! A run is one completed campaign analysis: the snapshot the user submitted,
//! the structured classification extracted from the analysis, and the full
//! analysis payload kept for display. Runs are written once and never
//! updated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::experiment::ProposedExperiment;
use crate::{Bottleneck, Error, Result};

/// Vertical a brand sells into. Similar cases never cross industries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Industry {
    Beauty,
    Wellness,
    Fashion,
}

impl Industry {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beauty => "Beauty",
            Self::Wellness => "Wellness",
            Self::Fashion => "Fashion",
        }
    }
}

impl FromStr for Industry {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beauty" => Ok(Self::Beauty),
            "wellness" => Ok(Self::Wellness),
            "fashion" => Ok(Self::Fashion),
            _ => Err(Error::Parse(format!("Invalid industry: {}", s))),
        }
    }
}

impl std::fmt::Display for Industry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reporting window the snapshot covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeWindow {
    #[serde(rename = "7 days")]
    SevenDays,
    #[serde(rename = "14 days")]
    FourteenDays,
    #[serde(rename = "30 days")]
    ThirtyDays,
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SevenDays => "7 days",
            Self::FourteenDays => "14 days",
            Self::ThirtyDays => "30 days",
        }
    }
}

impl FromStr for TimeWindow {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "7 days" | "7d" => Ok(Self::SevenDays),
            "14 days" | "14d" => Ok(Self::FourteenDays),
            "30 days" | "30d" => Ok(Self::ThirtyDays),
            _ => Err(Error::Parse(format!("Invalid time window: {}", s))),
        }
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Share of spend per channel, in percent
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelMix {
    pub meta: f64,
    pub google: f64,
    pub tiktok: f64,
}

/// Raw campaign metrics as submitted
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignMetrics {
    pub spend: f64,
    pub revenue: f64,
    /// Click-through rate, percent
    pub ctr: f64,
    pub cpm: f64,
    /// Conversion rate, percent
    pub conversion_rate: f64,
    pub aov: f64,
    pub ltv: f64,
}

/// Metrics derived from the snapshot before analysis
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedMetrics {
    pub roas: f64,
    pub cpc: f64,
    /// AOV / ROAS, a proxy when order counts are unavailable
    pub estimated_cac: f64,
}

impl CampaignMetrics {
    /// Derive ROAS, CPC and estimated CAC, each rounded to two decimals.
    /// A zero denominator yields zero rather than infinity.
    pub fn computed(&self) -> ComputedMetrics {
        let roas = if self.spend > 0.0 {
            self.revenue / self.spend
        } else {
            0.0
        };
        // CTR is a percentage and CPM is per thousand impressions
        let cpc = if self.ctr > 0.0 {
            self.cpm / (self.ctr * 10.0)
        } else {
            0.0
        };
        let estimated_cac = if roas > 0.0 { self.aov / roas } else { 0.0 };

        ComputedMetrics {
            roas: round2(roas),
            cpc: round2(cpc),
            estimated_cac: round2(estimated_cac),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Snapshot metrics together with the derived ones, as stored on a run
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    #[serde(flatten)]
    pub snapshot: CampaignMetrics,
    #[serde(flatten)]
    pub computed: ComputedMetrics,
}

impl From<CampaignMetrics> for RunMetrics {
    fn from(snapshot: CampaignMetrics) -> Self {
        Self {
            computed: snapshot.computed(),
            snapshot,
        }
    }
}

/// Period-over-period change per metric, in percent.
///
/// `None` means the metric was not measured, which is distinct from
/// `Some(0.0)` (measured, no change).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendDeltas {
    pub roas_delta: Option<f64>,
    pub ctr_delta: Option<f64>,
    pub cvr_delta: Option<f64>,
}

impl TrendDeltas {
    pub fn new(roas_delta: Option<f64>, ctr_delta: Option<f64>, cvr_delta: Option<f64>) -> Self {
        Self {
            roas_delta,
            ctr_delta,
            cvr_delta,
        }
    }
}

/// Campaign snapshot submitted for analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSnapshot {
    pub brand_name: String,
    pub industry: Industry,
    pub time_window: TimeWindow,
    pub channel_mix: ChannelMix,
    pub metrics: CampaignMetrics,
    pub trends: TrendDeltas,
    #[serde(default)]
    pub notes: String,
}

/// Risk section of an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub risk_score: u8,
    #[serde(default)]
    pub risk_drivers: Vec<String>,
}

/// Structured analysis produced upstream.
///
/// Only the fields the case library works with are typed; the rest of the
/// payload (summary, action plan, creative directions, ...) is carried
/// through untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub primary_bottleneck: Bottleneck,
    #[serde(default)]
    pub secondary_bottlenecks: Vec<Bottleneck>,
    pub confidence: f64,
    pub risk: RiskAssessment,
    #[serde(default)]
    pub experiments: Vec<ProposedExperiment>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A completed analysis ready to be recorded in the case library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSubmission {
    pub snapshot: CampaignSnapshot,
    pub analysis: AnalysisResult,
}

impl AnalysisSubmission {
    /// Boundary checks applied before anything is persisted
    pub fn validate(&self) -> Result<()> {
        if self.snapshot.brand_name.trim().is_empty() {
            return Err(Error::InvalidInput("Brand name is required".to_string()));
        }

        let mix = &self.snapshot.channel_mix;
        for (channel, share) in [("meta", mix.meta), ("google", mix.google), ("tiktok", mix.tiktok)] {
            if !(0.0..=100.0).contains(&share) {
                return Err(Error::InvalidInput(format!(
                    "Channel share for {} must be between 0 and 100",
                    channel
                )));
            }
        }

        let trends = &self.snapshot.trends;
        for delta in [trends.roas_delta, trends.ctr_delta, trends.cvr_delta]
            .into_iter()
            .flatten()
        {
            if !delta.is_finite() {
                return Err(Error::InvalidInput("Trend deltas must be finite".to_string()));
            }
        }

        if !(0.0..=1.0).contains(&self.analysis.confidence) {
            return Err(Error::InvalidInput(
                "Confidence must be between 0 and 1".to_string(),
            ));
        }

        if self.analysis.risk.risk_score > 100 {
            return Err(Error::InvalidInput(
                "Risk score must be between 0 and 100".to_string(),
            ));
        }

        Ok(())
    }
}

/// One completed analysis in the case library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub brand: String,
    pub industry: Industry,
    pub window: TimeWindow,
    pub primary_bottleneck: Bottleneck,
    pub secondary_bottlenecks: Vec<Bottleneck>,
    /// Certainty of the diagnosis, in [0, 1]
    pub confidence: f64,
    /// In [0, 100]
    pub risk_score: u8,
    pub trends: TrendDeltas,
    pub channel_mix: ChannelMix,
    pub metrics: RunMetrics,
    pub notes: String,
    /// Full analysis payload, for display only
    pub analysis: serde_json::Value,
}

impl Run {
    /// Create a bare run with neutral defaults
    pub fn new(industry: Industry, primary_bottleneck: Bottleneck) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            brand: String::new(),
            industry,
            window: TimeWindow::FourteenDays,
            primary_bottleneck,
            secondary_bottlenecks: Vec::new(),
            confidence: 0.0,
            risk_score: 0,
            trends: TrendDeltas::default(),
            channel_mix: ChannelMix::default(),
            metrics: RunMetrics::default(),
            notes: String::new(),
            analysis: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    /// Build the run recorded for a submitted analysis
    pub fn from_submission(submission: &AnalysisSubmission) -> Result<Self> {
        let snapshot = &submission.snapshot;
        let analysis = &submission.analysis;

        Ok(Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            brand: snapshot.brand_name.clone(),
            industry: snapshot.industry,
            window: snapshot.time_window,
            primary_bottleneck: analysis.primary_bottleneck,
            secondary_bottlenecks: analysis.secondary_bottlenecks.clone(),
            confidence: analysis.confidence,
            risk_score: analysis.risk.risk_score,
            trends: snapshot.trends,
            channel_mix: snapshot.channel_mix,
            metrics: snapshot.metrics.into(),
            notes: snapshot.notes.clone(),
            analysis: serde_json::to_value(analysis)?,
        })
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = brand.into();
        self
    }

    pub fn with_secondary(mut self, secondary: Vec<Bottleneck>) -> Self {
        self.secondary_bottlenecks = secondary;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_trends(mut self, trends: TrendDeltas) -> Self {
        self.trends = trends;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}
