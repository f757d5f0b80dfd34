//! Candidate selection for similar-case lookup

use uuid::Uuid;

use crate::{Industry, Run};

/// Storage-side filter for candidate runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateFilter {
    pub industry: Industry,
    pub exclude_id: Uuid,
}

impl CandidateFilter {
    /// Runs comparable to `target`: same industry, not the target itself
    pub fn for_target(target: &Run) -> Self {
        Self {
            industry: target.industry,
            exclude_id: target.id,
        }
    }

    pub fn matches(&self, run: &Run) -> bool {
        run.industry == self.industry && run.id != self.exclude_id
    }
}

/// Narrow a pool of runs to the candidates worth scoring against `target`.
///
/// Keeps same-industry runs other than the target, newest first, and at most
/// `limit` of them. Older runs beyond the limit are never considered even if
/// they would have scored well.
pub fn select_candidates<I>(target: &Run, pool: I, limit: usize) -> Vec<Run>
where
    I: IntoIterator<Item = Run>,
{
    let filter = CandidateFilter::for_target(target);
    let mut candidates: Vec<Run> = pool.into_iter().filter(|r| filter.matches(r)).collect();

    // Stable, so equal timestamps keep the order the pool gave them
    candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    candidates.truncate(limit);
    candidates
}
