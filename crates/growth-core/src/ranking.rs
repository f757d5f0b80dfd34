//! Similar-case ranking
//!
//! Given a freshly recorded run, finds the most comparable historical runs in
//! the same industry and attaches the experiments that won for them.
//!
//! The pipeline is read-only: resolve the target, pull a bounded candidate
//! pool, score, drop weak matches, sort, truncate, then look up winners for
//! the survivors. Any storage failure fails the whole request; partial
//! results are never returned.

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::candidates::{select_candidates, CandidateFilter};
use crate::config::RankingConfig;
use crate::experiment::{ExperimentStatus, ExperimentWithOutcomes};
use crate::repository::CaseRepository;
use crate::similarity::SimilarityScorer;
use crate::winners::winning_experiments;
use crate::{Error, Result, Run};

/// One historical run judged similar to the target
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarCase {
    pub run: Run,
    pub similarity_score: u8,
    pub winning_experiments: Vec<ExperimentWithOutcomes>,
}

/// Parse a caller-supplied run identifier
pub fn parse_run_id(raw: &str) -> Result<Uuid> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::InvalidInput("runId required".to_string()));
    }
    Uuid::parse_str(raw).map_err(|_| Error::InvalidInput(format!("Malformed run id: {}", raw)))
}

/// Similar-case ranking engine
pub struct SimilarityEngine {
    config: RankingConfig,
    scorer: SimilarityScorer,
}

impl Default for SimilarityEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimilarityEngine {
    /// Create an engine with default tuning
    pub fn new() -> Self {
        Self::with_config(RankingConfig::default())
    }

    /// Create an engine with custom tuning
    pub fn with_config(config: RankingConfig) -> Self {
        let scorer = SimilarityScorer::with_config(config.similarity.clone());
        Self { config, scorer }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Rank historical runs against the run identified by `target_run_id`
    #[tracing::instrument(skip(self, repo), level = "debug")]
    pub async fn rank<R>(&self, repo: &R, target_run_id: &str) -> Result<Vec<SimilarCase>>
    where
        R: CaseRepository + ?Sized,
    {
        let id = parse_run_id(target_run_id)?;

        let target = repo
            .get_run(id)
            .await
            .map_err(Error::into_unavailable)?
            .ok_or_else(|| Error::RunNotFound(id.to_string()))?;

        let pool = repo
            .list_runs(&CandidateFilter::for_target(&target), self.config.candidate_limit)
            .await
            .map_err(Error::into_unavailable)?;
        let candidates = select_candidates(&target, pool, self.config.candidate_limit);
        let candidate_count = candidates.len();

        let ranked = self.rank_candidates(&target, candidates);

        let mut similar = Vec::with_capacity(ranked.len());
        for (run, similarity_score) in ranked {
            let experiments = repo
                .list_experiments_for_run(run.id, Some(ExperimentStatus::Completed))
                .await
                .map_err(Error::into_unavailable)?;

            similar.push(SimilarCase {
                winning_experiments: winning_experiments(experiments),
                run,
                similarity_score,
            });
        }

        debug!(
            target_run = %id,
            industry = %target.industry,
            candidates = candidate_count,
            returned = similar.len(),
            "Ranked similar cases"
        );

        Ok(similar)
    }

    /// Score, threshold, sort and truncate a candidate list.
    ///
    /// `candidates` must already be newest first: the sort is stable, so
    /// equal scores keep that order and ties favour recent runs.
    pub fn rank_candidates(&self, target: &Run, candidates: Vec<Run>) -> Vec<(Run, u8)> {
        let mut scored: Vec<(Run, u8)> = candidates
            .into_iter()
            .map(|candidate| {
                let score = self.scorer.score(target, &candidate);
                (candidate, score)
            })
            .filter(|(_, score)| *score >= self.config.min_score)
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.truncate(self.config.max_results);
        scored
    }
}
