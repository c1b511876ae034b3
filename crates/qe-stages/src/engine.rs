//! Query Engine: owns the collaborators and the pipeline runner
use qe_cache::ResultCache;
use qe_core::{EngineConfig, PipelineRunner, QueryEngineError, QueryInput, QueryOutput};
use qe_quality::ResultValidator;
use qe_store::{QueryStore, SqliteStore};
use qe_translator::{ChatCompletionClient, QueryTranslator};
use std::sync::Arc;

use crate::standard_stages;

pub struct QueryEngine {
    runner: PipelineRunner,
    cache: Arc<ResultCache>,
}

impl QueryEngine {
    pub fn new(
        translator: QueryTranslator,
        store: Arc<dyn QueryStore>,
        cache: Arc<ResultCache>,
        validator: ResultValidator,
    ) -> Result<Self, QueryEngineError> {
        let mode = if translator.has_generator() { "llm" } else { "deterministic" };
        let stages = standard_stages(Arc::new(translator), store, cache.clone(), validator);
        let runner = PipelineRunner::new(stages)?.with_generation_mode(mode);
        tracing::info!(
            pipeline = runner.pipeline_id(),
            generation_mode = mode,
            "query engine initialized"
        );
        Ok(Self { runner, cache })
    }

    /// Wire the engine from configuration. Without an API key the translator
    /// stays deterministic and emits the fallback query.
    pub fn from_config(config: &EngineConfig) -> Result<Self, QueryEngineError> {
        let translator = match ChatCompletionClient::from_config(&config.generation)
            .map_err(|e| QueryEngineError::Config(e.to_string()))?
        {
            Some(client) => QueryTranslator::new(Box::new(client)),
            None => {
                tracing::warn!("no generation API key configured, using deterministic SQL");
                QueryTranslator::deterministic()
            }
        };

        let store = Arc::new(SqliteStore::new(&config.database));
        let cache = ResultCache::from_config(&config.cache)
            .map_err(|e| QueryEngineError::Cache(e.to_string()))?;
        let validator = ResultValidator::new(config.validation.null_rate_threshold);

        Self::new(translator, store, Arc::new(cache), validator)
    }

    pub fn process(&self, input: &QueryInput) -> QueryOutput {
        self.runner.process(input)
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn pipeline_id(&self) -> &str {
        self.runner.pipeline_id()
    }
}
