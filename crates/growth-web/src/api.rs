//! REST API endpoints with authentication and validation

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use growth_core::{
    AnalysisSubmission, Database, Experiment, ExperimentStatus, NewOutcome, RankingConfig, Run,
    RunHistoryEntry, SimilarCase, SimilarityEngine,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Default number of runs returned by the history endpoint
const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Maximum number of runs returned by the history endpoint
const MAX_HISTORY_LIMIT: usize = 100;

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.code.as_str() {
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

impl ApiError {
    fn unauthorized() -> Self {
        Self {
            error: "Invalid or missing API key".to_string(),
            code: "unauthorized".to_string(),
        }
    }

    fn not_found(entity: &str) -> Self {
        Self {
            error: format!("{} not found", entity),
            code: "not_found".to_string(),
        }
    }

    fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            code: "bad_request".to_string(),
        }
    }

    fn validation(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            code: "validation_error".to_string(),
        }
    }

    fn conflict(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            code: "conflict".to_string(),
        }
    }

    fn unavailable(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            code: "unavailable".to_string(),
        }
    }

    fn internal(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            code: "internal_error".to_string(),
        }
    }
}

impl From<growth_core::Error> for ApiError {
    fn from(err: growth_core::Error) -> Self {
        use growth_core::Error;

        match err {
            Error::InvalidInput(msg) => Self::bad_request(msg),
            Error::RunNotFound(_) => Self::not_found("Run"),
            Error::ExperimentNotFound(_) => Self::not_found("Experiment"),
            Error::InvalidStateTransition(from, to) => {
                Self::conflict(format!("Cannot move experiment from {} to {}", from, to))
            }
            Error::Unavailable(msg) => {
                tracing::warn!(error = %msg, "Case library unavailable");
                Self::unavailable("Case library temporarily unavailable")
            }
            other => {
                tracing::error!(error = %other, "Request failed");
                Self::internal(format!("Database error: {}", other))
            }
        }
    }
}

/// Application state
pub struct AppState {
    pub db: Database,
    pub api_key: Option<SecretString>,
    pub engine: SimilarityEngine,
}

impl AppState {
    /// Create new app state with optional API key authentication
    pub fn new(db: Database, api_key: Option<String>) -> Self {
        Self::with_ranking(db, api_key, RankingConfig::default())
    }

    /// Create app state with custom ranking tuning
    pub fn with_ranking(db: Database, api_key: Option<String>, ranking: RankingConfig) -> Self {
        Self {
            db,
            api_key: api_key.map(SecretString::new),
            engine: SimilarityEngine::with_config(ranking),
        }
    }
}

/// Authentication middleware
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    // No key configured means the API is open
    let Some(ref expected_key) = state.api_key else {
        return Ok(next.run(request).await);
    };

    let headers = request.headers();
    let provided_key = headers
        .get("x-api-key")
        .or_else(|| headers.get("authorization"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.strip_prefix("Bearer ").unwrap_or(s));

    match provided_key {
        Some(key) if key == expected_key.expose_secret() => Ok(next.run(request).await),
        _ => Err(ApiError::unauthorized()),
    }
}

/// Create the API router (API endpoints only)
pub fn create_api_router(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/api/similar", get(similar_cases))
        .route("/api/history", get(history))
        .route("/api/runs", post(create_run))
        .route("/api/runs/:id", get(get_run))
        .route("/api/experiments/:id/status", post(update_experiment_status))
        .route("/api/experiments/:id/outcome", post(record_outcome))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let public_routes = Router::new().route("/api/health", get(health_check));

    Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .with_state(state)
}

/// Create the full router with request tracing
pub fn create_router(state: Arc<AppState>) -> Router {
    create_api_router(state).layer(TraceLayer::new_for_http())
}

fn parse_experiment_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::bad_request("Invalid UUID format"))
}

// ==================== Handlers ====================

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn similar_cases(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SimilarQuery>,
) -> Result<Json<SimilarResponse>, ApiError> {
    let run_id = query.run_id.unwrap_or_default();
    let similar = state.engine.rank(&state.db, &run_id).await?;
    Ok(Json(SimilarResponse { similar }))
}

async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if limit == 0 || limit > MAX_HISTORY_LIMIT {
        return Err(ApiError::validation(format!(
            "limit must be between 1 and {}",
            MAX_HISTORY_LIMIT
        )));
    }

    let runs = state.db.list_recent_runs(limit).await?;
    Ok(Json(HistoryResponse { runs }))
}

async fn create_run(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<AnalysisSubmission>,
) -> Result<(StatusCode, Json<CreateRunResponse>), ApiError> {
    submission
        .validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    let (run, experiments) = state.db.record_analysis(&submission).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateRunResponse {
            run_id: run.id,
            experiment_ids: experiments.iter().map(|e| e.id).collect(),
        }),
    ))
}

async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Run>, ApiError> {
    let id = growth_core::parse_run_id(&id)?;

    let run = state
        .db
        .get_run(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Run"))?;

    Ok(Json(run))
}

async fn update_experiment_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Experiment>, ApiError> {
    let id = parse_experiment_id(&id)?;
    let experiment = state.db.update_experiment_status(id, req.status).await?;
    Ok(Json(experiment))
}

async fn record_outcome(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(outcome): Json<NewOutcome>,
) -> Result<(StatusCode, Json<RecordOutcomeResponse>), ApiError> {
    let id = parse_experiment_id(&id)?;
    let outcome = state.db.record_outcome(id, outcome).await?;

    Ok((
        StatusCode::CREATED,
        Json(RecordOutcomeResponse {
            outcome_id: outcome.id,
            experiment_id: outcome.experiment_id,
            status: ExperimentStatus::Completed,
        }),
    ))
}

// ==================== Request/Response Types ====================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarQuery {
    pub run_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SimilarResponse {
    pub similar: Vec<SimilarCase>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub runs: Vec<RunHistoryEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRunResponse {
    pub run_id: Uuid,
    pub experiment_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ExperimentStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOutcomeResponse {
    pub outcome_id: Uuid,
    pub experiment_id: Uuid,
    pub status: ExperimentStatus,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
