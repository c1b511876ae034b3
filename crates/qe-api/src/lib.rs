//! QE API /v1: REST endpoints over the query engine
pub mod handlers;
pub mod metrics;
pub mod middleware;

use axum::{
    routing::{delete, get, post},
    Router,
};
use qe_stages::QueryEngine;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(engine: QueryEngine) -> Result<Self, prometheus::Error> {
        Ok(Self {
            engine: Arc::new(engine),
            metrics: Arc::new(Metrics::new()?),
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/v1/query", post(handlers::query))
        .route("/v1/cache/stats", get(handlers::cache_stats))
        .route("/v1/cache", delete(handlers::clear_cache))
        .route("/v1/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::cors())
        .with_state(state)
}

pub async fn run(addr: &str, state: AppState) -> anyhow::Result<()> {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("QE API listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
