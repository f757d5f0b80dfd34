//! Integration tests for the growth operator
//!
//! These tests verify end-to-end behavior across multiple crates

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use chrono::{Duration, TimeZone, Utc};
use growth_core::{
    AppConfig, Bottleneck, Database, Experiment, ExperimentStatus, Industry, NewOutcome,
    NullTrendPolicy, OutcomeStatus, Run, SimilarityEngine, TrendDeltas,
};
use growth_web::{create_api_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

// ==================== Test Helpers ====================

async fn setup_db() -> Database {
    Database::in_memory().await.unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn at(minutes: i64) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes)
}

/// Scenario A target
fn target_run() -> Run {
    Run::new(Industry::Wellness, Bottleneck::Creative)
        .with_brand("Target")
        .with_secondary(vec![Bottleneck::Conversion])
        .with_confidence(0.82)
        .with_trends(TrendDeltas::new(Some(-18.0), Some(-24.0), Some(-15.0)))
        .with_created_at(at(500))
}

/// Scores 45 against `target_run`: primary plus one shared secondary
fn candidate_scoring_45(minutes: i64) -> Run {
    Run::new(Industry::Wellness, Bottleneck::Creative)
        .with_brand("Candidate")
        .with_secondary(vec![Bottleneck::Conversion])
        .with_confidence(0.40)
        .with_trends(TrendDeltas::new(Some(3.0), Some(3.0), Some(3.0)))
        .with_created_at(at(minutes))
}

// ==================== Ranking against SQLite ====================

mod ranking {
    use super::*;

    async fn completed_winner(db: &Database, run: &Run) -> Experiment {
        let experiment = Experiment::new(run.id, Bottleneck::Creative, "Founder-led video");
        db.insert_run_with_experiments(run, std::slice::from_ref(&experiment))
            .await
            .unwrap();
        db.record_outcome(experiment.id, NewOutcome::new(OutcomeStatus::Win))
            .await
            .unwrap();
        experiment
    }

    #[tokio::test]
    async fn test_scenario_a_scores_ninety() {
        let db = setup_db().await;
        let target = target_run();
        let candidate = Run::new(Industry::Wellness, Bottleneck::Creative)
            .with_secondary(vec![Bottleneck::Conversion, Bottleneck::Efficiency])
            .with_confidence(0.75)
            .with_trends(TrendDeltas::new(Some(-10.0), Some(-5.0), Some(-20.0)))
            .with_created_at(at(100));
        db.insert_run(&target).await.unwrap();
        db.insert_run(&candidate).await.unwrap();

        let similar = SimilarityEngine::new()
            .rank(&db, &target.id.to_string())
            .await
            .unwrap();

        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].run.id, candidate.id);
        assert_eq!(similar[0].similarity_score, 90);
        assert!(similar[0].winning_experiments.is_empty());
    }

    #[tokio::test]
    async fn test_completed_winner_attached() {
        let db = setup_db().await;
        let target = target_run();
        db.insert_run(&target).await.unwrap();
        let candidate = candidate_scoring_45(100);
        let experiment = completed_winner(&db, &candidate).await;

        let similar = SimilarityEngine::new()
            .rank(&db, &target.id.to_string())
            .await
            .unwrap();

        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].similarity_score, 45);
        assert_eq!(similar[0].winning_experiments.len(), 1);
        assert_eq!(similar[0].winning_experiments[0].experiment.id, experiment.id);
    }

    #[tokio::test]
    async fn test_running_experiment_not_attached() {
        let db = setup_db().await;
        let target = target_run();
        db.insert_run(&target).await.unwrap();

        let candidate = candidate_scoring_45(100);
        let experiment = Experiment::new(candidate.id, Bottleneck::Creative, "Founder-led video");
        db.insert_run_with_experiments(&candidate, std::slice::from_ref(&experiment))
            .await
            .unwrap();
        db.update_experiment_status(experiment.id, ExperimentStatus::Running)
            .await
            .unwrap();

        let similar = SimilarityEngine::new()
            .rank(&db, &target.id.to_string())
            .await
            .unwrap();

        assert_eq!(similar.len(), 1);
        assert!(similar[0].winning_experiments.is_empty());
    }

    #[tokio::test]
    async fn test_completed_loss_then_win_is_winner() {
        let db = setup_db().await;
        let target = target_run();
        db.insert_run(&target).await.unwrap();

        let candidate = candidate_scoring_45(100);
        let experiment = Experiment::new(candidate.id, Bottleneck::Creative, "Offer test");
        db.insert_run_with_experiments(&candidate, std::slice::from_ref(&experiment))
            .await
            .unwrap();
        db.record_outcome(experiment.id, NewOutcome::new(OutcomeStatus::Win))
            .await
            .unwrap();
        db.record_outcome(experiment.id, NewOutcome::new(OutcomeStatus::Loss))
            .await
            .unwrap();

        let similar = SimilarityEngine::new()
            .rank(&db, &target.id.to_string())
            .await
            .unwrap();

        assert_eq!(similar[0].winning_experiments.len(), 1);
        assert_eq!(
            similar[0].winning_experiments[0].outcomes[0].outcome_status,
            OutcomeStatus::Loss
        );
    }

    #[tokio::test]
    async fn test_top_three_of_many() {
        let db = setup_db().await;
        let target = target_run();
        db.insert_run(&target).await.unwrap();

        for i in 0..8 {
            db.insert_run(&candidate_scoring_45(i)).await.unwrap();
        }
        // Other industries never surface
        db.insert_run(
            &Run::new(Industry::Beauty, Bottleneck::Creative)
                .with_secondary(vec![Bottleneck::Conversion])
                .with_confidence(0.82)
                .with_created_at(at(900)),
        )
        .await
        .unwrap();

        let similar = SimilarityEngine::new()
            .rank(&db, &target.id.to_string())
            .await
            .unwrap();

        assert_eq!(similar.len(), 3);
        assert!(similar
            .iter()
            .all(|case| case.run.industry == Industry::Wellness && case.similarity_score == 45));
        let created: Vec<_> = similar.iter().map(|case| case.run.created_at).collect();
        assert_eq!(created, vec![at(7), at(6), at(5)]);
    }

    #[tokio::test]
    async fn test_null_trend_policy_from_config() {
        let db = setup_db().await;
        let target = Run::new(Industry::Fashion, Bottleneck::Scaling)
            .with_confidence(0.9)
            .with_created_at(at(10));
        let candidate = Run::new(Industry::Fashion, Bottleneck::Efficiency)
            .with_confidence(0.1)
            .with_created_at(at(5));
        db.insert_run(&target).await.unwrap();
        db.insert_run(&candidate).await.unwrap();

        // Only the three null-trend matches can score: 25 points
        let default_engine = SimilarityEngine::new();
        let similar = default_engine
            .rank(&db, &target.id.to_string())
            .await
            .unwrap();
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].similarity_score, 25);

        let config = AppConfig::from_yaml("ranking:\n  similarity:\n    null_trends: unmatched\n")
            .unwrap();
        assert_eq!(config.ranking.similarity.null_trends, NullTrendPolicy::Unmatched);
        let strict_engine = SimilarityEngine::with_config(config.ranking);
        let similar = strict_engine
            .rank(&db, &target.id.to_string())
            .await
            .unwrap();
        assert!(similar.is_empty());
    }
}

// ==================== API workflow ====================

mod workflow {
    use super::*;

    fn submission(brand: &str) -> Value {
        json!({
            "snapshot": {
                "brandName": brand,
                "industry": "Wellness",
                "timeWindow": "7 days",
                "channelMix": { "meta": 60, "google": 25, "tiktok": 15 },
                "metrics": {
                    "spend": 15000, "revenue": 30000, "ctr": 1.1, "cpm": 18,
                    "conversionRate": 2.0, "aov": 55, "ltv": 160
                },
                "trends": { "roasDelta": -12, "ctrDelta": -20, "cvrDelta": 2 }
            },
            "analysis": {
                "primaryBottleneck": "Creative",
                "secondaryBottlenecks": ["Scaling"],
                "confidence": 0.7,
                "risk": { "riskScore": 40 },
                "experiments": [
                    {
                        "category": "Creative",
                        "name": "Testimonial carousel",
                        "hypothesis": "Social proof lifts CTR",
                        "setup": "Three carousel variants",
                        "successMetrics": ["CTR >= 1.4%"],
                        "guardrails": []
                    }
                ]
            }
        })
    }

    async fn send(
        router: &axum::Router,
        method: Method,
        uri: &str,
        payload: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match payload {
            Some(payload) => {
                builder = builder.header("content-type", "application/json");
                Body::from(payload.to_string())
            }
            None => Body::empty(),
        };

        let response = router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        (status, body_to_json(response.into_body()).await)
    }

    #[tokio::test]
    async fn test_ingest_outcome_and_rank() {
        let state = Arc::new(AppState::new(setup_db().await, None));
        let router = create_api_router(state);

        let (status, created) =
            send(&router, Method::POST, "/api/runs", Some(submission("First"))).await;
        assert_eq!(status, StatusCode::CREATED);
        let experiment_id = created["experimentIds"][0].as_str().unwrap().to_string();

        let (status, _) = send(
            &router,
            Method::POST,
            &format!("/api/experiments/{}/status", experiment_id),
            Some(json!({ "status": "Running" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, outcome) = send(
            &router,
            Method::POST,
            &format!("/api/experiments/{}/outcome", experiment_id),
            Some(json!({ "outcomeStatus": "Win", "learnings": ["Proof beats polish"] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(outcome["status"], "Completed");

        let (_, second) =
            send(&router, Method::POST, "/api/runs", Some(submission("Second"))).await;
        let target_id = second["runId"].as_str().unwrap();

        let (status, body) = send(
            &router,
            Method::GET,
            &format!("/api/similar?runId={}", target_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let similar = body["similar"].as_array().unwrap();
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0]["run"]["id"], created["runId"]);
        assert_eq!(similar[0]["similarityScore"], 90);
        assert_eq!(similar[0]["winningExperiments"][0]["id"], experiment_id.as_str());
        assert_eq!(
            similar[0]["winningExperiments"][0]["outcomes"][0]["learnings"][0],
            "Proof beats polish"
        );

        let (status, history) = send(&router, Method::GET, "/api/history", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["runs"].as_array().unwrap().len(), 2);
        assert_eq!(history["runs"][0]["brand"], "Second");
    }

    #[tokio::test]
    async fn test_custom_ranking_limits() {
        let mut config = AppConfig::default();
        config.ranking.max_results = 1;
        config.ranking.min_score = 95;

        let state = Arc::new(AppState::with_ranking(setup_db().await, None, config.ranking));
        let router = create_api_router(state);

        send(&router, Method::POST, "/api/runs", Some(submission("First"))).await;
        let (_, second) =
            send(&router, Method::POST, "/api/runs", Some(submission("Second"))).await;
        let target_id = second["runId"].as_str().unwrap();

        let (status, body) = send(
            &router,
            Method::GET,
            &format!("/api/similar?runId={}", target_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["similar"].as_array().unwrap().is_empty());
    }
}
