use qe_core::{RequestState, Stage, StageError, StageName};
use qe_translator::QueryTranslator;
use std::sync::Arc;

/// Fills `sql_query` from the intent
pub struct SqlGeneratorStage {
    translator: Arc<QueryTranslator>,
}

impl SqlGeneratorStage {
    pub fn new(translator: Arc<QueryTranslator>) -> Self {
        Self { translator }
    }
}

impl Stage for SqlGeneratorStage {
    fn name(&self) -> StageName {
        StageName::SqlGenerator
    }

    fn run(&self, state: &mut RequestState) -> Result<(), StageError> {
        tracing::info!("generating SQL query");

        let translation = self.translator.translate(
            state.intent_type(),
            state.metric(),
            state.dimension(),
            state.raw_prompt(),
            state.enhanced_prompt(),
        );
        if translation.sql.is_empty() {
            return Err(StageError::GenerationFailed("translator returned no SQL".to_string()));
        }

        state.annotate("query", translation.sql.as_str());
        state.annotate("sql_source", translation.source.as_str());
        state.sql_query = translation.sql;
        Ok(())
    }
}
