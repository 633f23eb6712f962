//! HTTP routes
//!
//! Route map:
//! - `GET /health` - liveness probe (name + version)
//! - `POST /api/v1/sync` - trigger a sync run
//! - `GET /api/v1/sync/status` - engine state and live counters
//! - `GET /api/v1/sync/report` - most recent completed run report
//!
//! The trigger dispatches the run to a background task and acknowledges
//! immediately; the report is retrieved asynchronously once the run has
//! finished.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::middleware;
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use feedsync_engine::{RunReport, RunState, StatsSnapshot};
use serde::Serialize;
use serde_json::json;
use tower_http::compression::CompressionLayer;

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState, config: &AppConfig) -> Router {
    let sync_routes = Router::new()
        .route("/sync", post(trigger_sync))
        .route("/sync/status", get(sync_status))
        .route("/sync/report", get(sync_report));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", sync_routes)
        .with_state(state)
        // Apply layers from innermost to outermost
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

/// Health check handler
async fn health_check() -> impl IntoResponse {
    Json(json!({
        "name": "feedsync-server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Engine state and live counters, refreshed while a run is in flight
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    state: RunState,
    stats: StatsSnapshot,
    last_error: Option<String>,
}

/// Trigger a sync run
///
/// # Endpoint
///
/// `POST /api/v1/sync`
///
/// # Response
///
/// - `202 Accepted` - run dispatched to a background task
/// - `409 Conflict` - a run is already fetching or processing
#[tracing::instrument(skip(state))]
async fn trigger_sync(State(state): State<AppState>) -> AppResult<Response> {
    let run_id = state.start_background_run()?;

    tracing::info!(%run_id, "sync run dispatched via API");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "started", "runId": run_id })),
    )
        .into_response())
}

/// Current engine state
///
/// # Endpoint
///
/// `GET /api/v1/sync/status`
async fn sync_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let last_error = state.last_error.read().await.clone();

    Json(StatusResponse {
        state: state.engine.state(),
        stats: state.engine.stats_snapshot(),
        last_error,
    })
}

/// Most recent completed run report
///
/// # Endpoint
///
/// `GET /api/v1/sync/report`
///
/// # Response
///
/// - `200 OK` - the last finished report
/// - `404 Not Found` - no run has completed yet
async fn sync_report(State(state): State<AppState>) -> AppResult<Json<RunReport>> {
    let report = state.last_report.read().await.clone();

    report
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no completed sync run yet".to_string()))
}
