//! Growth Core - Case library types, similarity ranking and database layer
//!
//! This crate provides the fundamental pieces of the growth operator:
//! - Analysis runs, experiments and outcomes
//! - Pairwise run similarity scoring
//! - Similar-case ranking with winning experiments
//! - SQLite persistence

pub mod bottleneck;
pub mod candidates;
pub mod config;
pub mod database;
pub mod error;
pub mod experiment;
pub mod outcome;
pub mod ranking;
pub mod repository;
pub mod run;
pub mod similarity;
pub mod winners;

pub use bottleneck::Bottleneck;
pub use database::{Database, DatabaseConfig, RunHistoryEntry};
pub use error::{Error, Result};

// Re-export domain types
pub use experiment::{Experiment, ExperimentStatus, ExperimentWithOutcomes, ProposedExperiment};
pub use outcome::{MetricsDelta, NewOutcome, Outcome, OutcomeStatus};
pub use run::{
    AnalysisResult, AnalysisSubmission, CampaignMetrics, CampaignSnapshot, ChannelMix,
    ComputedMetrics, Industry, RiskAssessment, Run, RunMetrics, TimeWindow, TrendDeltas,
};

// Re-export ranking types
pub use candidates::{select_candidates, CandidateFilter};
pub use config::{AppConfig, NullTrendPolicy, RankingConfig, SimilarityConfig};
pub use ranking::{parse_run_id, SimilarCase, SimilarityEngine};
pub use repository::{CaseRepository, MemoryRepository};
pub use similarity::{trend_sign, ScoreBreakdown, SimilarityScorer, TrendSign};
pub use winners::winning_experiments;
