use qe_cache::{CachedPayload, ResultCache};
use qe_core::{RequestState, Stage, StageError, StageName};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Writes cache-worthy results back to the cache. Terminal stage.
pub struct CacheManagerStage {
    cache: Arc<ResultCache>,
}

impl CacheManagerStage {
    pub fn new(cache: Arc<ResultCache>) -> Self {
        Self { cache }
    }
}

impl Stage for CacheManagerStage {
    fn name(&self) -> StageName {
        StageName::CacheManager
    }

    fn run(&self, state: &mut RequestState) -> Result<(), StageError> {
        let fallback_used = state.metadata().get("fallback_used") == Some(&Value::Bool(true));
        if state.formatted_data.is_empty() || state.cache_hit || state.error.is_some() || fallback_used {
            tracing::debug!("skipping cache storage");
            return Ok(());
        }

        let (should_cache, ttl) = self
            .cache
            .should_cache(&state.signature(), state.formatted_data.len());
        if !should_cache {
            tracing::debug!("results not suitable for caching");
            return Ok(());
        }
        if state.cache_key.is_empty() {
            tracing::warn!("no cache key available for storage");
            return Ok(());
        }

        let payload = CachedPayload {
            data: state.formatted_data.clone(),
            metadata: state.metadata().clone(),
        };
        match self.cache.store(&state.cache_key, payload, Duration::from_secs(ttl)) {
            Ok(()) => {
                tracing::info!(ttl_secs = ttl, "results cached");
                state.annotate("cached", true);
                state.annotate("cache_ttl", ttl);
            }
            Err(err) => {
                tracing::warn!(error = %err, "cache storage failed");
                state.warn(format!("Cache storage failed: {}", err));
            }
        }
        Ok(())
    }
}
