//! Winning-experiment extraction

use crate::experiment::{ExperimentStatus, ExperimentWithOutcomes};

/// Experiments that proved out: completed, with at least one winning trial.
///
/// A win anywhere in the history counts, even if later re-tests lost. Input
/// order is preserved.
pub fn winning_experiments(
    experiments: impl IntoIterator<Item = ExperimentWithOutcomes>,
) -> Vec<ExperimentWithOutcomes> {
    experiments
        .into_iter()
        .filter(|e| e.experiment.status == ExperimentStatus::Completed && e.has_win())
        .collect()
}
