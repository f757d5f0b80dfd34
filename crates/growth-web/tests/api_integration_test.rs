//! Integration tests for the case library REST API

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use growth_core::{AnalysisSubmission, Database, ExperimentStatus, NewOutcome, OutcomeStatus};
use growth_web::{create_api_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn body_to_string(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_to_json(body: Body) -> Value {
    serde_json::from_str(&body_to_string(body).await).unwrap()
}

async fn setup_app() -> (axum::Router, Arc<AppState>) {
    let db = Database::in_memory().await.unwrap();
    let state = Arc::new(AppState::new(db, None));
    let router = create_api_router(state.clone());
    (router, state)
}

async fn setup_app_with_key(key: &str) -> axum::Router {
    let db = Database::in_memory().await.unwrap();
    let state = Arc::new(AppState::new(db, Some(key.to_string())));
    create_api_router(state)
}

fn submission_json(brand: &str, confidence: f64) -> Value {
    json!({
        "snapshot": {
            "brandName": brand,
            "industry": "Beauty",
            "timeWindow": "14 days",
            "channelMix": { "meta": 70, "google": 20, "tiktok": 10 },
            "metrics": {
                "spend": 20000, "revenue": 42000, "ctr": 0.9, "cpm": 22.5,
                "conversionRate": 2.4, "aov": 68, "ltv": 190
            },
            "trends": { "roasDelta": -18, "ctrDelta": -24, "cvrDelta": -15 }
        },
        "analysis": {
            "primaryBottleneck": "Creative",
            "secondaryBottlenecks": ["Conversion"],
            "confidence": confidence,
            "risk": { "riskScore": 58 },
            "experiments": [
                {
                    "category": "Creative",
                    "name": "UGC hook rotation",
                    "hypothesis": "Fresh hooks recover CTR",
                    "setup": "Launch 6 new UGC hooks",
                    "successMetrics": ["CTR >= 1.2%"],
                    "guardrails": ["CPA <= $40"]
                }
            ]
        }
    })
}

fn submission(brand: &str) -> AnalysisSubmission {
    serde_json::from_value(submission_json(brand, 0.82)).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

// ==================== Health & Auth ====================

#[tokio::test]
async fn test_health_is_public() {
    let router = setup_app_with_key("secret").await;

    let response = router.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_missing_api_key_rejected() {
    let router = setup_app_with_key("secret").await;

    let response = router.oneshot(get("/api/history")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn test_api_key_header_and_bearer_accepted() {
    let router = setup_app_with_key("secret").await;

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/history")
                .header("x-api-key", "secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/history")
                .header("authorization", "Bearer secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_wrong_api_key_rejected() {
    let router = setup_app_with_key("secret").await;

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/history")
                .header("x-api-key", "guess")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ==================== POST /api/runs ====================

#[tokio::test]
async fn test_create_run() {
    let (router, state) = setup_app().await;

    let response = router
        .oneshot(post_json("/api/runs", &submission_json("Glow Lab", 0.82)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_to_json(response.into_body()).await;
    let run_id = body["runId"].as_str().unwrap().parse().unwrap();
    assert_eq!(body["experimentIds"].as_array().unwrap().len(), 1);

    let run = state.db.get_run(run_id).await.unwrap().unwrap();
    assert_eq!(run.brand, "Glow Lab");
}

#[tokio::test]
async fn test_create_run_rejects_out_of_range_confidence() {
    let (router, state) = setup_app().await;

    let response = router
        .oneshot(post_json("/api/runs", &submission_json("Glow Lab", 1.5)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["code"], "validation_error");
    assert_eq!(state.db.count_runs().await.unwrap(), 0);
}

// ==================== GET /api/runs/:id ====================

#[tokio::test]
async fn test_get_run() {
    let (router, state) = setup_app().await;
    let (run, _) = state.db.record_analysis(&submission("Glow Lab")).await.unwrap();

    let response = router
        .oneshot(get(&format!("/api/runs/{}", run.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["id"], run.id.to_string());
    assert_eq!(body["industry"], "Beauty");
    assert_eq!(body["primaryBottleneck"], "Creative");
}

#[tokio::test]
async fn test_get_unknown_run() {
    let (router, _state) = setup_app().await;

    let response = router
        .oneshot(get(&format!("/api/runs/{}", uuid::Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_run_malformed_id() {
    let (router, _state) = setup_app().await;

    let response = router.oneshot(get("/api/runs/not-a-uuid")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ==================== GET /api/similar ====================

#[tokio::test]
async fn test_similar_requires_run_id() {
    let (router, _state) = setup_app().await;

    let response = router.oneshot(get("/api/similar")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["error"], "runId required");
}

#[tokio::test]
async fn test_similar_unknown_run() {
    let (router, _state) = setup_app().await;

    let response = router
        .oneshot(get(&format!("/api/similar?runId={}", uuid::Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_similar_returns_winning_experiments() {
    let (router, state) = setup_app().await;

    let (earlier, experiments) = state.db.record_analysis(&submission("Earlier")).await.unwrap();
    state
        .db
        .record_outcome(experiments[0].id, NewOutcome::new(OutcomeStatus::Win))
        .await
        .unwrap();
    let (target, _) = state.db.record_analysis(&submission("Target")).await.unwrap();

    let response = router
        .oneshot(get(&format!("/api/similar?runId={}", target.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_to_json(response.into_body()).await;
    let similar = body["similar"].as_array().unwrap();
    assert_eq!(similar.len(), 1);
    assert_eq!(similar[0]["run"]["id"], earlier.id.to_string());
    assert_eq!(similar[0]["similarityScore"], 90);

    let winners = similar[0]["winningExperiments"].as_array().unwrap();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0]["id"], experiments[0].id.to_string());
    assert_eq!(winners[0]["status"], "Completed");
    assert_eq!(winners[0]["outcomes"][0]["outcomeStatus"], "Win");
}

// ==================== GET /api/history ====================

#[tokio::test]
async fn test_history_limit() {
    let (router, state) = setup_app().await;
    for i in 0..4 {
        state
            .db
            .record_analysis(&submission(&format!("Brand {}", i)))
            .await
            .unwrap();
    }

    let response = router
        .clone()
        .oneshot(get("/api/history?limit=2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await;
    let runs = body["runs"].as_array().unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0]["brand"], "Brand 3");
    assert_eq!(runs[0]["experiments"].as_array().unwrap().len(), 1);

    let response = router.oneshot(get("/api/history?limit=0")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ==================== Experiment lifecycle ====================

#[tokio::test]
async fn test_update_experiment_status() {
    let (router, state) = setup_app().await;
    let (_, experiments) = state.db.record_analysis(&submission("Glow Lab")).await.unwrap();
    let uri = format!("/api/experiments/{}/status", experiments[0].id);

    let response = router
        .clone()
        .oneshot(post_json(&uri, &json!({ "status": "Running" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["status"], "Running");

    let response = router
        .oneshot(post_json(&uri, &json!({ "status": "Proposed" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_update_unknown_experiment_status() {
    let (router, _state) = setup_app().await;

    let response = router
        .oneshot(post_json(
            &format!("/api/experiments/{}/status", uuid::Uuid::new_v4()),
            &json!({ "status": "Running" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_record_outcome() {
    let (router, state) = setup_app().await;
    let (_, experiments) = state.db.record_analysis(&submission("Glow Lab")).await.unwrap();
    let experiment_id = experiments[0].id;

    let payload = json!({
        "outcomeStatus": "Win",
        "notes": "CTR recovered to 1.3%",
        "metricsDelta": { "ctr": 0.4 },
        "learnings": ["Creator-led hooks outperform studio"],
        "recommendedNext": ["Scale winning hooks"]
    });

    let response = router
        .oneshot(post_json(
            &format!("/api/experiments/{}/outcome", experiment_id),
            &payload,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["experimentId"], experiment_id.to_string());
    assert_eq!(body["status"], "Completed");

    let experiment = state.db.get_experiment(experiment_id).await.unwrap().unwrap();
    assert_eq!(experiment.status, ExperimentStatus::Completed);
}

#[tokio::test]
async fn test_record_outcome_unknown_experiment() {
    let (router, _state) = setup_app().await;

    let response = router
        .oneshot(post_json(
            &format!("/api/experiments/{}/outcome", uuid::Uuid::new_v4()),
            &json!({ "outcomeStatus": "Loss" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
