//! API Handlers
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use qe_core::{QueryInput, QueryOutput, QE_VERSION};
use serde_json::{json, Value};
use std::time::Instant;

use crate::AppState;

type ApiError = (StatusCode, Json<Value>);

fn internal(message: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message.to_string() })),
    )
}

/// Run one request through the pipeline on a blocking thread
pub async fn query(
    State(state): State<AppState>,
    Json(input): Json<QueryInput>,
) -> Result<Json<QueryOutput>, ApiError> {
    let start = Instant::now();
    let engine = state.engine.clone();

    let output = tokio::task::spawn_blocking(move || engine.process(&input))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "pipeline task aborted");
            internal(e)
        })?;

    state.metrics.observe(&output, start.elapsed());
    Ok(Json(output))
}

pub async fn cache_stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let stats = state.engine.cache().stats().map_err(internal)?;
    Ok(Json(json!(stats)))
}

pub async fn clear_cache(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.engine.cache().clear().map_err(internal)?;
    Ok(Json(json!({ "cleared": true })))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": QE_VERSION,
        "pipeline": state.engine.pipeline_id(),
    }))
}

pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let body = state.metrics.encode().map_err(internal)?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
