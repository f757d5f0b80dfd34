//! Read access to the case library
//!
//! The ranking pipeline only ever reads. [`crate::Database`] is the
//! production implementation; [`MemoryRepository`] keeps everything in
//! process.

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::candidates::CandidateFilter;
use crate::experiment::{Experiment, ExperimentStatus, ExperimentWithOutcomes};
use crate::outcome::Outcome;
use crate::{Result, Run};

/// Persistence operations the similar-case lookup depends on
#[async_trait]
pub trait CaseRepository: Send + Sync {
    /// Fetch a run by id
    async fn get_run(&self, id: Uuid) -> Result<Option<Run>>;

    /// Runs matching `filter`, newest first, at most `limit`
    async fn list_runs(&self, filter: &CandidateFilter, limit: usize) -> Result<Vec<Run>>;

    /// Experiments linked to a run, optionally restricted to one status, each
    /// with its outcomes newest first
    async fn list_experiments_for_run(
        &self,
        run_id: Uuid,
        status: Option<ExperimentStatus>,
    ) -> Result<Vec<ExperimentWithOutcomes>>;
}

#[derive(Default)]
struct MemoryState {
    runs: Vec<Run>,
    experiments: Vec<Experiment>,
    outcomes: Vec<Outcome>,
}

/// In-process case library
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_run(&self, run: Run) {
        self.state.write().await.runs.push(run);
    }

    pub async fn insert_experiment(&self, experiment: Experiment) {
        self.state.write().await.experiments.push(experiment);
    }

    /// Store an outcome as-is; the parent experiment's status is left alone
    pub async fn insert_outcome(&self, outcome: Outcome) {
        self.state.write().await.outcomes.push(outcome);
    }
}

#[async_trait]
impl CaseRepository for MemoryRepository {
    async fn get_run(&self, id: Uuid) -> Result<Option<Run>> {
        let state = self.state.read().await;
        Ok(state.runs.iter().find(|r| r.id == id).cloned())
    }

    async fn list_runs(&self, filter: &CandidateFilter, limit: usize) -> Result<Vec<Run>> {
        let state = self.state.read().await;
        let mut runs: Vec<Run> = state
            .runs
            .iter()
            .rev()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        // Stable sort over reversed insertion order: ties list the latest insert first
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs.truncate(limit);
        Ok(runs)
    }

    async fn list_experiments_for_run(
        &self,
        run_id: Uuid,
        status: Option<ExperimentStatus>,
    ) -> Result<Vec<ExperimentWithOutcomes>> {
        let state = self.state.read().await;
        let mut linked: Vec<&Experiment> = state
            .experiments
            .iter()
            .filter(|e| e.linked_run_id == run_id)
            .filter(|e| status.map_or(true, |s| e.status == s))
            .collect();
        linked.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let experiments = linked
            .into_iter()
            .map(|experiment| {
                let mut outcomes: Vec<Outcome> = state
                    .outcomes
                    .iter()
                    .rev()
                    .filter(|o| o.experiment_id == experiment.id)
                    .cloned()
                    .collect();
                outcomes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                ExperimentWithOutcomes::new(experiment.clone(), outcomes)
            })
            .collect();
        Ok(experiments)
    }
}
