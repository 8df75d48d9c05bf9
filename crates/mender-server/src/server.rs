//! Axum router and handlers

use crate::error::ApiError;
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use mender_core::{RunId, RunRequest};
use mender_runs::{RunDriver, RunReport};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared application state
pub struct AppState {
    pub driver: RunDriver,
    /// Retry budget given to every triggered run
    pub max_retries: u32,
}

pub type SharedState = Arc<AppState>;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/trigger-agent", post(trigger_agent))
        .route("/status/:run_id", get(run_status))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Serve the API until the listener fails
pub async fn serve(state: AppState, addr: &str) -> anyhow::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Mender API listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

/// GET /
async fn root() -> Json<Value> {
    Json(json!({ "message": "Mender agent API is running" }))
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "mender"
    }))
}

/// POST /trigger-agent - start a run in the background
async fn trigger_agent(
    State(app): State<SharedState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<Value>, ApiError> {
    let run_id = app.driver.start(request, app.max_retries).await?;
    Ok(Json(json!({ "run_id": run_id, "status": "started" })))
}

/// GET /status/:run_id - latest report snapshot
async fn run_status(
    State(app): State<SharedState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunReport>, ApiError> {
    app.driver
        .registry()
        .get(&RunId::from(run_id))
        .await
        .map(Json)
        .ok_or(ApiError::NotFound)
}
