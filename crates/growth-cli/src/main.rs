//! Growth CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use growth_core::{
    AnalysisSubmission, AppConfig, Database, ExperimentStatus, NewOutcome, OutcomeStatus,
    SimilarCase, SimilarityEngine,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Initialize logging with the specified verbosity level
fn init_logging(verbose: u8, quiet: bool, json: bool) -> Result<()> {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter =
        EnvFilter::from_default_env().add_directive(format!("growth={}", level).parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .with_file(verbose >= 3)
        .with_line_number(verbose >= 3);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "growth")]
#[command(about = "Case library and similar-case ranking for growth diagnostics")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database path
    #[arg(
        long,
        env = "GROWTH_DB_PATH",
        default_value = "~/.growth-operator/growth.db",
        global = true
    )]
    db_path: String,

    /// Configuration file (YAML)
    #[arg(long, env = "GROWTH_CONFIG", global = true)]
    config: Option<String>,

    /// Increase verbosity (-v: info, -vv: debug, -vvv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output logs as JSON (for machine parsing)
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
    /// Show historical runs most similar to a run
    Similar {
        /// Target run ID
        run_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recent runs with their experiments
    History {
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record an analysis from a JSON file
    Import {
        /// Path to an analysis submission (snapshot + analysis)
        file: PathBuf,
    },
    /// Experiment management
    Experiment {
        #[command(subcommand)]
        action: ExperimentAction,
    },
}

#[derive(Subcommand)]
enum ExperimentAction {
    /// Change an experiment's status
    Status {
        /// Experiment ID
        id: String,
        /// New status (Running, Completed, Archived)
        status: ExperimentStatus,
    },
    /// Record an outcome; the experiment becomes Completed
    Outcome {
        /// Experiment ID
        id: String,
        /// Result (Win, Loss, Neutral, Inconclusive)
        #[arg(long)]
        result: OutcomeStatus,
        #[arg(long, default_value = "")]
        notes: String,
        /// Learning to record (repeatable)
        #[arg(long = "learning")]
        learnings: Vec<String>,
        /// Recommended next step (repeatable)
        #[arg(long = "next")]
        next: Vec<String>,
    },
}

fn load_config(path: Option<&str>) -> Result<AppConfig> {
    match path {
        Some(path) => {
            let path = shellexpand::tilde(path).to_string();
            AppConfig::load(&path).with_context(|| format!("Failed to load config from {}", path))
        }
        None => Ok(AppConfig::default()),
    }
}

fn parse_experiment_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).with_context(|| format!("Invalid experiment ID: {}", id))
}

fn print_similar(cases: &[SimilarCase]) {
    if cases.is_empty() {
        println!("No similar cases found");
        return;
    }

    println!(
        "{:<6} {:<36} {:<24} {:<12} {}",
        "SCORE", "RUN", "BRAND", "BOTTLENECK", "WINNERS"
    );
    println!("{}", "-".repeat(90));
    for case in cases {
        println!(
            "{:<6} {:<36} {:<24} {:<12} {}",
            case.similarity_score,
            case.run.id,
            case.run.brand.chars().take(24).collect::<String>(),
            case.run.primary_bottleneck.as_str(),
            case.winning_experiments.len()
        );
        for winner in &case.winning_experiments {
            println!("       ✓ {} ({})", winner.experiment.name, winner.experiment.category);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet, cli.log_json)?;

    let config = load_config(cli.config.as_deref())?;

    let db_path = shellexpand::tilde(&cli.db_path).to_string();
    let db = Database::new(PathBuf::from(db_path)).await?;

    match cli.command {
        Commands::Serve { port } => {
            use growth_web::{create_router, AppState};

            println!("Starting API server on http://localhost:{}", port);

            let api_key = std::env::var("GROWTH_API_KEY").ok();
            if api_key.is_some() {
                println!("API key authentication enabled");
            }

            let state = Arc::new(AppState::with_ranking(db, api_key, config.ranking));
            let app = create_router(state);

            let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
            info!(port, "API server listening");
            axum::serve(listener, app).await?;
        }

        Commands::Similar { run_id, json } => {
            let engine = SimilarityEngine::with_config(config.ranking);
            let cases = engine.rank(&db, &run_id).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&cases)?);
            } else {
                print_similar(&cases);
            }
        }

        Commands::History { limit, json } => {
            let entries = db.list_recent_runs(limit).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No runs recorded");
            } else {
                println!(
                    "{:<36} {:<20} {:<10} {:<12} {}",
                    "ID", "CREATED", "INDUSTRY", "BOTTLENECK", "EXPERIMENTS"
                );
                println!("{}", "-".repeat(92));
                for entry in entries {
                    println!(
                        "{:<36} {:<20} {:<10} {:<12} {}",
                        entry.run.id,
                        entry.run.created_at.format("%Y-%m-%d %H:%M").to_string(),
                        entry.run.industry.as_str(),
                        entry.run.primary_bottleneck.as_str(),
                        entry.experiments.len()
                    );
                }
            }
        }

        Commands::Import { file } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let submission: AnalysisSubmission = serde_json::from_str(&contents)
                .with_context(|| format!("Invalid analysis submission in {}", file.display()))?;
            submission.validate()?;

            let (run, experiments) = db.record_analysis(&submission).await?;

            println!("✓ Run recorded: {}", run.id);
            println!("  Brand: {}", run.brand);
            println!("  Primary bottleneck: {}", run.primary_bottleneck);
            for experiment in experiments {
                println!("  Experiment {}: {}", experiment.id, experiment.name);
            }
        }

        Commands::Experiment { action } => match action {
            ExperimentAction::Status { id, status } => {
                let id = parse_experiment_id(&id)?;
                let experiment = db.update_experiment_status(id, status).await?;
                println!("✓ Experiment {} is now {}", experiment.id, experiment.status);
            }
            ExperimentAction::Outcome {
                id,
                result,
                notes,
                learnings,
                next,
            } => {
                let id = parse_experiment_id(&id)?;
                let outcome = NewOutcome::new(result)
                    .with_notes(notes)
                    .with_learnings(learnings)
                    .with_recommended_next(next);

                let outcome = db.record_outcome(id, outcome).await?;
                println!("✓ Outcome recorded: {}", outcome.id);
                println!("  Result: {}", outcome.outcome_status);
                println!("  Experiment {} is now {}", id, ExperimentStatus::Completed);
            }
        },
    }

    Ok(())
}
