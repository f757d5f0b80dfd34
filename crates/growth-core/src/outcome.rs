//! Experiment outcomes
//!
//! Outcomes are append-only. An experiment may be re-tested, so several
//! outcomes can exist for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Result classification of one trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeStatus {
    Win,
    Loss,
    Neutral,
    Inconclusive,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Win => "Win",
            Self::Loss => "Loss",
            Self::Neutral => "Neutral",
            Self::Inconclusive => "Inconclusive",
        }
    }
}

impl FromStr for OutcomeStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "win" => Ok(Self::Win),
            "loss" => Ok(Self::Loss),
            "neutral" => Ok(Self::Neutral),
            "inconclusive" => Ok(Self::Inconclusive),
            _ => Err(crate::Error::Parse(format!("Invalid outcome status: {}", s))),
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observed change per metric, each independently optional
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsDelta {
    #[serde(default)]
    pub roas: Option<f64>,
    #[serde(default)]
    pub cac: Option<f64>,
    #[serde(default)]
    pub ctr: Option<f64>,
    #[serde(default)]
    pub cvr: Option<f64>,
}

/// Result to record for an experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOutcome {
    pub outcome_status: OutcomeStatus,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub metrics_delta: MetricsDelta,
    #[serde(default)]
    pub learnings: Vec<String>,
    #[serde(default)]
    pub recommended_next: Vec<String>,
}

impl NewOutcome {
    pub fn new(outcome_status: OutcomeStatus) -> Self {
        Self {
            outcome_status,
            notes: String::new(),
            metrics_delta: MetricsDelta::default(),
            learnings: Vec::new(),
            recommended_next: Vec::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_learnings(mut self, learnings: Vec<String>) -> Self {
        self.learnings = learnings;
        self
    }

    pub fn with_recommended_next(mut self, recommended_next: Vec<String>) -> Self {
        self.recommended_next = recommended_next;
        self
    }
}

/// A recorded outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub id: Uuid,
    pub experiment_id: Uuid,
    pub outcome_status: OutcomeStatus,
    pub notes: String,
    pub metrics_delta: MetricsDelta,
    pub learnings: Vec<String>,
    pub recommended_next: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Outcome {
    pub fn new(experiment_id: Uuid, outcome_status: OutcomeStatus) -> Self {
        Self::from_new(experiment_id, NewOutcome::new(outcome_status))
    }

    pub fn from_new(experiment_id: Uuid, new: NewOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            experiment_id,
            outcome_status: new.outcome_status,
            notes: new.notes,
            metrics_delta: new.metrics_delta,
            learnings: new.learnings,
            recommended_next: new.recommended_next,
            created_at: Utc::now(),
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}
