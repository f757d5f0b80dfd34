//! Growth experiments
//!
//! Every analysis proposes experiments, each targeting one bottleneck and
//! linked to the run that produced it. Status moves independently of the run:
//!
//! ```text
//! Proposed -> Running -> Completed
//!     \          \
//!      `----------`-> Archived
//! ```
//!
//! `Completed` is also forced whenever an outcome is recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::outcome::{Outcome, OutcomeStatus};
use crate::Bottleneck;

/// Status of an experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperimentStatus {
    /// Suggested by an analysis, not started
    Proposed,
    /// Live in the ad account
    Running,
    /// At least one outcome has been recorded
    Completed,
    /// Shelved without a result
    Archived,
}

impl ExperimentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => "Proposed",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Archived => "Archived",
        }
    }

    /// Check if an explicit status change to `target` is allowed
    pub fn can_transition_to(&self, target: ExperimentStatus) -> bool {
        use ExperimentStatus::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, target),
            (Proposed, Running | Archived) | (Running, Completed | Archived)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Archived)
    }
}

impl FromStr for ExperimentStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "proposed" => Ok(Self::Proposed),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "archived" => Ok(Self::Archived),
            _ => Err(crate::Error::Parse(format!(
                "Invalid experiment status: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Experiment as proposed inside an analysis, before it is recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedExperiment {
    pub category: Bottleneck,
    pub name: String,
    pub hypothesis: String,
    pub setup: String,
    #[serde(default)]
    pub success_metrics: Vec<String>,
    #[serde(default)]
    pub guardrails: Vec<String>,
}

/// A recorded experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub id: Uuid,
    pub linked_run_id: Uuid,
    pub category: Bottleneck,
    pub name: String,
    pub hypothesis: String,
    pub setup: String,
    pub success_metrics: Vec<String>,
    pub guardrails: Vec<String>,
    pub status: ExperimentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Experiment {
    pub fn new(linked_run_id: Uuid, category: Bottleneck, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            linked_run_id,
            category,
            name: name.into(),
            hypothesis: String::new(),
            setup: String::new(),
            success_metrics: Vec::new(),
            guardrails: Vec::new(),
            status: ExperimentStatus::Proposed,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a proposed experiment against the run that produced it
    pub fn from_proposal(linked_run_id: Uuid, proposal: &ProposedExperiment) -> Self {
        Self::new(linked_run_id, proposal.category, proposal.name.clone())
            .with_hypothesis(proposal.hypothesis.clone())
            .with_setup(proposal.setup.clone())
            .with_success_metrics(proposal.success_metrics.clone())
            .with_guardrails(proposal.guardrails.clone())
    }

    pub fn with_hypothesis(mut self, hypothesis: String) -> Self {
        self.hypothesis = hypothesis;
        self
    }

    pub fn with_setup(mut self, setup: String) -> Self {
        self.setup = setup;
        self
    }

    pub fn with_success_metrics(mut self, success_metrics: Vec<String>) -> Self {
        self.success_metrics = success_metrics;
        self
    }

    pub fn with_guardrails(mut self, guardrails: Vec<String>) -> Self {
        self.guardrails = guardrails;
        self
    }

    pub fn with_status(mut self, status: ExperimentStatus) -> Self {
        self.status = status;
        self
    }

    /// Apply an explicit status change
    pub fn transition_to(&mut self, new_status: ExperimentStatus) -> crate::Result<()> {
        if !self.status.can_transition_to(new_status) {
            return Err(crate::Error::InvalidStateTransition(
                self.status.to_string(),
                new_status.to_string(),
            ));
        }

        self.status = new_status;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// An experiment together with its outcomes, most recent first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentWithOutcomes {
    #[serde(flatten)]
    pub experiment: Experiment,
    pub outcomes: Vec<Outcome>,
}

impl ExperimentWithOutcomes {
    pub fn new(experiment: Experiment, outcomes: Vec<Outcome>) -> Self {
        Self {
            experiment,
            outcomes,
        }
    }

    /// True if any recorded trial was a win
    pub fn has_win(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| o.outcome_status == OutcomeStatus::Win)
    }
}
