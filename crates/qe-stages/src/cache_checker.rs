use qe_cache::ResultCache;
use qe_core::{RequestState, Stage, StageError, StageName};
use std::sync::Arc;

/// Looks the request up in the result cache; a hit short-circuits execution
pub struct CacheCheckerStage {
    cache: Arc<ResultCache>,
}

impl CacheCheckerStage {
    pub fn new(cache: Arc<ResultCache>) -> Self {
        Self { cache }
    }
}

impl Stage for CacheCheckerStage {
    fn name(&self) -> StageName {
        StageName::CacheChecker
    }

    fn run(&self, state: &mut RequestState) -> Result<(), StageError> {
        let key = self.cache.key_for(&state.signature());
        state.cache_key = key.clone();
        state.annotate("cache_key", key.as_str());

        let cached = self
            .cache
            .lookup(&key)
            .map_err(|e| StageError::CacheUnavailable(e.to_string()))?;

        match cached {
            Some(payload) => {
                tracing::info!(records = payload.data.len(), "cache hit");
                state.formatted_data = payload.data;
                state.merge_metadata(payload.metadata);
                state.cache_hit = true;
                // retrieval is effectively free
                state.execution_time = 0.001;
            }
            None => {
                tracing::info!("cache miss, will execute query");
                state.cache_hit = false;
            }
        }
        state.annotate("cache_hit", state.cache_hit);
        Ok(())
    }
}
