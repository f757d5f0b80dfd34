//! Database layer for SQLite

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::candidates::CandidateFilter;
use crate::experiment::{Experiment, ExperimentStatus, ExperimentWithOutcomes};
use crate::outcome::{NewOutcome, Outcome, OutcomeStatus};
use crate::repository::CaseRepository;
use crate::run::{AnalysisSubmission, Industry, Run, TimeWindow, TrendDeltas};
use crate::{Bottleneck, Error, Result};

/// Database configuration
pub struct DatabaseConfig {
    /// Maximum number of connections
    pub max_connections: u32,
    /// Connection acquire timeout
    pub acquire_timeout: Duration,
    /// Idle connection timeout
    pub idle_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// A run with every experiment it proposed and their outcomes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunHistoryEntry {
    #[serde(flatten)]
    pub run: Run,
    pub experiments: Vec<ExperimentWithOutcomes>,
}

/// Database connection and operations
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection with default config
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(path, DatabaseConfig::default()).await
    }

    /// Create a new database connection with custom config
    pub async fn with_config(path: impl AsRef<Path>, config: DatabaseConfig) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .connect(&url)
            .await?;

        // WAL for concurrent readers, foreign keys for experiment/outcome links
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA foreign_keys=ON")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA busy_timeout=5000")
            .execute(&pool)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        tracing::debug!(path = %path.display(), "Opened case library");
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::query("PRAGMA foreign_keys=ON")
            .execute(&pool)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(include_str!("../../../migrations/001_initial.sql"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== Run Operations ====================

    /// Record a completed analysis: the run and one proposed experiment per
    /// suggestion, all or nothing
    #[tracing::instrument(skip(self, submission), level = "debug", fields(brand = %submission.snapshot.brand_name))]
    pub async fn record_analysis(
        &self,
        submission: &AnalysisSubmission,
    ) -> Result<(Run, Vec<Experiment>)> {
        let run = Run::from_submission(submission)?;
        let experiments: Vec<Experiment> = submission
            .analysis
            .experiments
            .iter()
            .map(|proposal| Experiment::from_proposal(run.id, proposal))
            .collect();

        self.insert_run_with_experiments(&run, &experiments).await?;
        tracing::info!(run_id = %run.id, experiments = experiments.len(), "Recorded analysis run");
        Ok((run, experiments))
    }

    /// Insert a run and its experiments in one transaction
    pub async fn insert_run_with_experiments(
        &self,
        run: &Run,
        experiments: &[Experiment],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO analysis_runs (id, created_at, brand, industry, time_window, primary_bottleneck,
                secondary_bottlenecks, confidence, risk_score, roas_delta, ctr_delta, cvr_delta,
                channel_mix, metrics, notes, analysis)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run.id.to_string())
        .bind(format_timestamp(&run.created_at))
        .bind(&run.brand)
        .bind(run.industry.as_str())
        .bind(run.window.as_str())
        .bind(run.primary_bottleneck.as_str())
        .bind(serde_json::to_string(&run.secondary_bottlenecks)?)
        .bind(run.confidence)
        .bind(i64::from(run.risk_score))
        .bind(run.trends.roas_delta)
        .bind(run.trends.ctr_delta)
        .bind(run.trends.cvr_delta)
        .bind(serde_json::to_string(&run.channel_mix)?)
        .bind(serde_json::to_string(&run.metrics)?)
        .bind(&run.notes)
        .bind(serde_json::to_string(&run.analysis)?)
        .execute(&mut *tx)
        .await?;

        for experiment in experiments {
            sqlx::query(
                r#"
                INSERT INTO experiments (id, linked_run_id, category, name, hypothesis, setup,
                    success_metrics, guardrails, status, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(experiment.id.to_string())
            .bind(experiment.linked_run_id.to_string())
            .bind(experiment.category.as_str())
            .bind(&experiment.name)
            .bind(&experiment.hypothesis)
            .bind(&experiment.setup)
            .bind(serde_json::to_string(&experiment.success_metrics)?)
            .bind(serde_json::to_string(&experiment.guardrails)?)
            .bind(experiment.status.as_str())
            .bind(format_timestamp(&experiment.created_at))
            .bind(format_timestamp(&experiment.updated_at))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Insert a run on its own
    pub async fn insert_run(&self, run: &Run) -> Result<()> {
        self.insert_run_with_experiments(run, &[]).await
    }

    /// Get a run by ID
    pub async fn get_run(&self, id: Uuid) -> Result<Option<Run>> {
        let row = sqlx::query_as::<_, RunRow>("SELECT * FROM analysis_runs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_into()).transpose()
    }

    /// Same-industry runs other than the excluded one, newest first
    pub async fn list_runs(&self, filter: &CandidateFilter, limit: usize) -> Result<Vec<Run>> {
        let rows = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT * FROM analysis_runs
            WHERE industry = ? AND id != ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(filter.industry.as_str())
        .bind(filter.exclude_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Most recent runs with their experiments and outcomes
    pub async fn list_recent_runs(&self, limit: usize) -> Result<Vec<RunHistoryEntry>> {
        let rows = sqlx::query_as::<_, RunRow>(
            "SELECT * FROM analysis_runs ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let run: Run = row.try_into()?;
            let experiments = self.list_experiments_for_run(run.id, None).await?;
            entries.push(RunHistoryEntry { run, experiments });
        }
        Ok(entries)
    }

    /// Count recorded runs
    pub async fn count_runs(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM analysis_runs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // ==================== Experiment Operations ====================

    /// Get an experiment by ID
    pub async fn get_experiment(&self, id: Uuid) -> Result<Option<Experiment>> {
        let row = sqlx::query_as::<_, ExperimentRow>("SELECT * FROM experiments WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_into()).transpose()
    }

    /// Experiments linked to a run in creation order, optionally one status only
    pub async fn list_experiments_for_run(
        &self,
        run_id: Uuid,
        status: Option<ExperimentStatus>,
    ) -> Result<Vec<ExperimentWithOutcomes>> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, ExperimentRow>(
                    r#"
                    SELECT * FROM experiments
                    WHERE linked_run_id = ? AND status = ?
                    ORDER BY created_at ASC, rowid ASC
                    "#,
                )
                .bind(run_id.to_string())
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, ExperimentRow>(
                    "SELECT * FROM experiments WHERE linked_run_id = ? ORDER BY created_at ASC, rowid ASC",
                )
                .bind(run_id.to_string())
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut experiments = Vec::with_capacity(rows.len());
        for row in rows {
            let experiment: Experiment = row.try_into()?;
            let outcomes = self.list_outcomes(experiment.id).await?;
            experiments.push(ExperimentWithOutcomes::new(experiment, outcomes));
        }
        Ok(experiments)
    }

    /// Apply an explicit status change, enforcing the experiment lifecycle
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn update_experiment_status(
        &self,
        id: Uuid,
        status: ExperimentStatus,
    ) -> Result<Experiment> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ExperimentRow>("SELECT * FROM experiments WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::ExperimentNotFound(id.to_string()))?;

        let mut experiment: Experiment = row.try_into()?;
        experiment.transition_to(status)?;

        sqlx::query("UPDATE experiments SET status = ?, updated_at = ? WHERE id = ?")
            .bind(experiment.status.as_str())
            .bind(format_timestamp(&experiment.updated_at))
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(experiment_id = %id, status = %experiment.status, "Experiment status updated");
        Ok(experiment)
    }

    // ==================== Outcome Operations ====================

    /// Append an outcome; the experiment becomes `Completed` whatever its
    /// previous status
    #[tracing::instrument(skip(self, outcome), level = "debug", fields(result = %outcome.outcome_status))]
    pub async fn record_outcome(&self, experiment_id: Uuid, outcome: NewOutcome) -> Result<Outcome> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, String>("SELECT id FROM experiments WHERE id = ?")
            .bind(experiment_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(Error::ExperimentNotFound(experiment_id.to_string()));
        }

        let outcome = Outcome::from_new(experiment_id, outcome);

        sqlx::query(
            r#"
            INSERT INTO experiment_outcomes (id, experiment_id, outcome_status, notes, metrics_delta,
                learnings, recommended_next, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(outcome.id.to_string())
        .bind(experiment_id.to_string())
        .bind(outcome.outcome_status.as_str())
        .bind(&outcome.notes)
        .bind(serde_json::to_string(&outcome.metrics_delta)?)
        .bind(serde_json::to_string(&outcome.learnings)?)
        .bind(serde_json::to_string(&outcome.recommended_next)?)
        .bind(format_timestamp(&outcome.created_at))
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE experiments SET status = ?, updated_at = ? WHERE id = ?")
            .bind(ExperimentStatus::Completed.as_str())
            .bind(format_timestamp(&outcome.created_at))
            .bind(experiment_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(experiment_id = %experiment_id, outcome_id = %outcome.id, "Outcome recorded");
        Ok(outcome)
    }

    /// Outcomes of an experiment, newest first
    pub async fn list_outcomes(&self, experiment_id: Uuid) -> Result<Vec<Outcome>> {
        let rows = sqlx::query_as::<_, OutcomeRow>(
            r#"
            SELECT * FROM experiment_outcomes
            WHERE experiment_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(experiment_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }
}

#[async_trait]
impl CaseRepository for Database {
    async fn get_run(&self, id: Uuid) -> Result<Option<Run>> {
        Database::get_run(self, id).await
    }

    async fn list_runs(&self, filter: &CandidateFilter, limit: usize) -> Result<Vec<Run>> {
        Database::list_runs(self, filter, limit).await
    }

    async fn list_experiments_for_run(
        &self,
        run_id: Uuid,
        status: Option<ExperimentStatus>,
    ) -> Result<Vec<ExperimentWithOutcomes>> {
        Database::list_experiments_for_run(self, run_id, status).await
    }
}

// ==================== Row Types ====================

/// Fixed-width UTC timestamps so lexical order matches time order
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(s)?)
}

#[derive(sqlx::FromRow)]
struct RunRow {
    id: String,
    created_at: String,
    brand: String,
    industry: String,
    time_window: String,
    primary_bottleneck: String,
    secondary_bottlenecks: String,
    confidence: f64,
    risk_score: i64,
    roas_delta: Option<f64>,
    ctr_delta: Option<f64>,
    cvr_delta: Option<f64>,
    channel_mix: String,
    metrics: String,
    notes: String,
    analysis: String,
}

impl TryFrom<RunRow> for Run {
    type Error = Error;

    fn try_from(row: RunRow) -> Result<Self> {
        Ok(Run {
            id: parse_uuid(&row.id)?,
            created_at: parse_timestamp(&row.created_at)?,
            brand: row.brand,
            industry: Industry::from_str(&row.industry)?,
            window: TimeWindow::from_str(&row.time_window)?,
            primary_bottleneck: Bottleneck::from_str(&row.primary_bottleneck)?,
            secondary_bottlenecks: serde_json::from_str(&row.secondary_bottlenecks)?,
            confidence: row.confidence,
            risk_score: u8::try_from(row.risk_score)
                .map_err(|_| Error::Parse(format!("Risk score out of range: {}", row.risk_score)))?,
            trends: TrendDeltas::new(row.roas_delta, row.ctr_delta, row.cvr_delta),
            channel_mix: serde_json::from_str(&row.channel_mix)?,
            metrics: serde_json::from_str(&row.metrics)?,
            notes: row.notes,
            analysis: serde_json::from_str(&row.analysis)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ExperimentRow {
    id: String,
    linked_run_id: String,
    category: String,
    name: String,
    hypothesis: String,
    setup: String,
    success_metrics: String,
    guardrails: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ExperimentRow> for Experiment {
    type Error = Error;

    fn try_from(row: ExperimentRow) -> Result<Self> {
        Ok(Experiment {
            id: parse_uuid(&row.id)?,
            linked_run_id: parse_uuid(&row.linked_run_id)?,
            category: Bottleneck::from_str(&row.category)?,
            name: row.name,
            hypothesis: row.hypothesis,
            setup: row.setup,
            success_metrics: serde_json::from_str(&row.success_metrics)?,
            guardrails: serde_json::from_str(&row.guardrails)?,
            status: ExperimentStatus::from_str(&row.status)?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OutcomeRow {
    id: String,
    experiment_id: String,
    outcome_status: String,
    notes: String,
    metrics_delta: String,
    learnings: String,
    recommended_next: String,
    created_at: String,
}

impl TryFrom<OutcomeRow> for Outcome {
    type Error = Error;

    fn try_from(row: OutcomeRow) -> Result<Self> {
        Ok(Outcome {
            id: parse_uuid(&row.id)?,
            experiment_id: parse_uuid(&row.experiment_id)?,
            outcome_status: OutcomeStatus::from_str(&row.outcome_status)?,
            notes: row.notes,
            metrics_delta: serde_json::from_str(&row.metrics_delta)?,
            learnings: serde_json::from_str(&row.learnings)?,
            recommended_next: serde_json::from_str(&row.recommended_next)?,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}
