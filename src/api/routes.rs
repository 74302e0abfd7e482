use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::IngestError;
use crate::history::{GroupedSeries, SnapshotStore, TimeSeriesBuilder};
use crate::models::{CycleReport, Snapshot};
use crate::scheduler::{CycleStatus, IngestScheduler, TriggerOutcome};
use crate::scrapers::canonical_team_name;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SnapshotStore>,
    pub scheduler: Arc<IngestScheduler>,
}

/// Create the API router
pub fn create_router(store: Arc<dyn SnapshotStore>, scheduler: Arc<IngestScheduler>) -> Router {
    let state = AppState { store, scheduler };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/probabilities", get(get_probabilities))
        .route("/api/all_data", get(get_all_data))
        .route("/api/teams/:team/latest", get(get_team_latest))
        .route("/api/scrape", post(post_scrape))
        .route("/api/scrape/status", get(get_scrape_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ===== Route Handlers =====

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Grouped per-team series for charting
async fn get_probabilities(
    State(state): State<AppState>,
) -> Result<Json<ProbabilitiesResponse>, ApiError> {
    let probabilities = TimeSeriesBuilder::new(state.store.as_ref()).grouped()?;
    Ok(Json(ProbabilitiesResponse {
        probabilities,
        last_updated: Utc::now(),
    }))
}

/// Flat export of every snapshot
async fn get_all_data(State(state): State<AppState>) -> Result<Json<Vec<Snapshot>>, ApiError> {
    let all = TimeSeriesBuilder::new(state.store.as_ref()).export()?;
    Ok(Json(all))
}

async fn get_team_latest(
    State(state): State<AppState>,
    Path(team): Path<String>,
) -> Result<Json<Snapshot>, ApiError> {
    let team = canonical_team_name(&team);
    state
        .store
        .most_recent(&team)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No snapshots for {}", team)))
}

/// Run a cycle now
async fn post_scrape(State(state): State<AppState>) -> Result<Json<CycleReport>, ApiError> {
    match state.scheduler.trigger().await {
        TriggerOutcome::Ran(Ok(report)) => Ok(Json(report)),
        TriggerOutcome::Ran(Err(e)) => Err(ApiError::Ingest(e)),
        TriggerOutcome::Busy => Err(ApiError::Busy),
    }
}

async fn get_scrape_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        running: state.scheduler.is_running(),
        last_cycle: state.scheduler.last_status(),
    })
}

// ===== Response Types =====

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ProbabilitiesResponse {
    probabilities: GroupedSeries,
    last_updated: DateTime<Utc>,
}

#[derive(Serialize)]
struct StatusResponse {
    running: bool,
    last_cycle: Option<CycleStatus>,
}

// ===== Error Handling =====

#[derive(Debug)]
enum ApiError {
    Database(anyhow::Error),
    Ingest(IngestError),
    NotFound(String),
    Busy,
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Database(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Database(err) => {
                tracing::error!("Database error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            ApiError::Ingest(err) if err.is_cycle_wide() => {
                (StatusCode::BAD_GATEWAY, err.to_string())
            }
            ApiError::Ingest(err) => {
                tracing::error!("Ingest persistence error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Busy => (
                StatusCode::CONFLICT,
                "An ingest cycle is already running".to_string(),
            ),
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
