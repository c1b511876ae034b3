use qe_core::{RequestState, Stage, StageError, StageName};
use qe_store::QueryStore;
use std::sync::Arc;

/// Runs `sql_query` against the data store
pub struct QueryExecutorStage {
    store: Arc<dyn QueryStore>,
}

impl QueryExecutorStage {
    pub fn new(store: Arc<dyn QueryStore>) -> Self {
        Self { store }
    }
}

impl Stage for QueryExecutorStage {
    fn name(&self) -> StageName {
        StageName::QueryExecutor
    }

    fn run(&self, state: &mut RequestState) -> Result<(), StageError> {
        if state.sql_query.is_empty() {
            return Err(StageError::ExecutionFailed("no SQL query to execute".to_string()));
        }

        let outcome = self.store.execute(&state.sql_query);
        state.execution_time = outcome.execution_time;

        if !outcome.success {
            return Err(StageError::ExecutionFailed(
                outcome.error.unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }

        tracing::info!(records = outcome.record_count, "query executed");
        state.raw_data = outcome.data;
        Ok(())
    }
}
