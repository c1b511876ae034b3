use qe_core::{RequestState, Stage, StageError, StageName};

use crate::fallback::fallback_rows;

/// Replaces a failed execution with placeholder rows and clears the error
#[derive(Default)]
pub struct ErrorHandlerStage;

impl Stage for ErrorHandlerStage {
    fn name(&self) -> StageName {
        StageName::ErrorHandler
    }

    fn run(&self, state: &mut RequestState) -> Result<(), StageError> {
        let Some(error) = state.error.take() else {
            return Err(StageError::FallbackFailed("no error to handle".to_string()));
        };
        tracing::warn!(error = %error, "handling query execution error");

        let rows = fallback_rows(state.intent_type(), state.metric(), state.dimension());
        let total = rows.len();
        state.raw_data = rows.clone();
        state.formatted_data = rows;

        state.annotate("status", "error_handled");
        state.annotate("original_error", error.message());
        state.annotate("fallback_used", true);
        state.annotate("cache_hit", false);
        state.annotate("total_records", total);

        tracing::info!(records = total, "error handled with fallback records");
        Ok(())
    }
}
