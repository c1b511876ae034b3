//! Binary entrypoint for the QE API server.
use anyhow::Context;
use qe_api::{run, AppState};
use qe_core::EngineConfig;
use qe_stages::QueryEngine;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Config file is optional; QE_CONFIG points at a YAML file
    let config = match std::env::var("QE_CONFIG") {
        Ok(path) => EngineConfig::from_file(&path)?,
        Err(_) => EngineConfig::default(),
    }
    .with_env_overrides()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // The engine owns a blocking HTTP client, so it is built outside the runtime
    let engine = QueryEngine::from_config(&config)?;
    let state = AppState::new(engine).context("registering metrics")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    // Held until the runtime is gone so the engine is never dropped on a worker
    let keep_alive = state.clone();
    let result = runtime.block_on(run(&config.server.addr, state));
    runtime.shutdown_background();
    drop(keep_alive);
    result
}
