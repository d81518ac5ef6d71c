use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::header,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::auth::{self, Credentials, TokenResponse};
use crate::domain::{Reading, Session, StartSessionRequest, StopSessionRequest};
use crate::error::{Error, Result};
use crate::export;
use crate::summary::{self, ExperimentSummary};

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

#[derive(Deserialize, Debug, Default)]
pub struct ReadingsParams {
    session_id: Option<String>,
    limit: Option<usize>,
}

impl ReadingsParams {
    fn session(&self) -> Option<&str> {
        self.session_id.as_deref().filter(|s| !s.is_empty())
    }

    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

// ==============================================================================
// service
// ==============================================================================

pub async fn service_info() -> Json<Value> {
    Json(json!({
        "message": "LabLink sensor gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "GET /health",
            "auth": {
                "signIn": "POST /auth/v1/token",
                "signUp": "POST /auth/v1/signup"
            },
            "sensor": {
                "ingest": "POST /api/sensor-data",
                "data": "GET /api/sensor-data",
                "latest": "GET /api/sensor-data/latest",
                "export": "GET /api/export/csv"
            },
            "sessions": {
                "start": "POST /sessions/start",
                "stop": "POST /sessions/stop"
            },
            "experiment": {
                "start": "POST /api/experiment/start",
                "stop": "POST /api/experiment/stop",
                "summary": "POST /api/experiment/summary"
            },
            "websocket": "GET /ws"
        }
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "relayRunning": state.relay.is_running().await,
        "connections": state.registry.len().await,
    }))
}

// ==============================================================================
// ingestion
// ==============================================================================

/// forward one device reading to the store
pub async fn ingest_reading(
    State(state): State<AppState>,
    body: std::result::Result<Json<Reading>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(reading) = body?;
    reading.validate()?;
    state.store.insert_reading(&reading).await?;
    tracing::debug!(session_id = %reading.session_id, device_ts = reading.device_ts, "reading stored");
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn start_session(
    State(state): State<AppState>,
    body: std::result::Result<Json<StartSessionRequest>, JsonRejection>,
) -> Result<Json<Session>> {
    let Json(req) = body?;
    if req.device_id.trim().is_empty() {
        return Err(Error::Validation("device_id must not be empty".into()));
    }
    let session = state.store.start_session(&req.device_id).await?;
    tracing::info!(session_id = %session.id, device_id = %session.device_id, "session started");
    Ok(Json(session))
}

pub async fn stop_session(
    State(state): State<AppState>,
    body: std::result::Result<Json<StopSessionRequest>, JsonRejection>,
) -> Result<Json<Session>> {
    let Json(req) = body?;
    if req.session_id.trim().is_empty() {
        return Err(Error::Validation("session_id must not be empty".into()));
    }
    let session = state.store.stop_session(&req.session_id).await?;
    tracing::info!(session_id = %session.id, "session stopped");
    Ok(Json(session))
}

// ==============================================================================
// reads
// ==============================================================================

pub async fn recent_readings(
    State(state): State<AppState>,
    Query(params): Query<ReadingsParams>,
) -> Result<Json<Vec<Reading>>> {
    let readings = state.store.recent_readings(params.session(), params.limit()).await?;
    Ok(Json(readings))
}

pub async fn latest_reading(
    State(state): State<AppState>,
    Query(params): Query<ReadingsParams>,
) -> Result<Json<Option<Reading>>> {
    Ok(Json(state.store.latest_reading(params.session()).await?))
}

pub async fn export_csv(
    State(state): State<AppState>,
    Query(params): Query<ReadingsParams>,
) -> Result<impl IntoResponse> {
    let readings = state.store.recent_readings(params.session(), params.limit()).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"sensor-data.csv\""),
        ],
        export::to_csv(&readings),
    ))
}

// ==============================================================================
// experiment
// ==============================================================================

pub async fn start_experiment(State(state): State<AppState>) -> Json<Value> {
    let changed = state.relay.start().await;
    tracing::info!(changed, "experiment start requested");
    let message = if changed { "Experiment started" } else { "Experiment already running" };
    Json(json!({
        "status": "started",
        "running": true,
        "changed": changed,
        "message": message,
    }))
}

pub async fn stop_experiment(State(state): State<AppState>) -> Json<Value> {
    let changed = state.relay.stop().await.is_some();
    tracing::info!(changed, "experiment stop requested");
    let message = if changed { "Experiment stopped" } else { "Experiment was not running" };
    Json(json!({
        "status": "stopped",
        "running": false,
        "changed": changed,
        "message": message,
    }))
}

#[derive(Deserialize, Debug, Default)]
pub struct SummaryParams {
    session_id: Option<String>,
}

pub async fn experiment_summary(
    State(state): State<AppState>,
    Query(params): Query<SummaryParams>,
) -> Result<Json<ExperimentSummary>> {
    let session = params.session_id.as_deref().filter(|s| !s.is_empty());
    let window = state.store.recent_readings(session, state.config.summary.window).await?;
    let summary = summary::summarize(&window, Utc::now());
    tracing::info!(
        data_points = summary.data_points,
        motion_events = summary.data_quality.motion_events,
        "summary generated"
    );
    Ok(Json(summary))
}

pub async fn no_data_summary() -> Json<ExperimentSummary> {
    Json(summary::no_data(Utc::now()))
}

// ==============================================================================
// auth
// ==============================================================================

pub async fn sign_in(
    State(state): State<AppState>,
    body: std::result::Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<TokenResponse>> {
    let Json(credentials) = body?;
    Ok(Json(auth::sign_in(&state.config.auth, &credentials)?))
}

pub async fn sign_up(
    body: std::result::Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<TokenResponse>> {
    let Json(credentials) = body?;
    Ok(Json(auth::sign_up(&credentials)?))
}
