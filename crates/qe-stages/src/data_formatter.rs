use qe_core::{RequestState, Stage, StageError, StageName};
use qe_quality::ResultValidator;

/// Cleans `raw_data` into `formatted_data` and records validation stats
pub struct DataFormatterStage {
    validator: ResultValidator,
}

impl DataFormatterStage {
    pub fn new(validator: ResultValidator) -> Self {
        Self { validator }
    }
}

impl Default for DataFormatterStage {
    fn default() -> Self {
        Self::new(ResultValidator::default())
    }
}

impl Stage for DataFormatterStage {
    fn name(&self) -> StageName {
        StageName::DataFormatter
    }

    fn run(&self, state: &mut RequestState) -> Result<(), StageError> {
        let report = self.validator.validate(&state.raw_data, &state.signature());
        let stats = serde_json::to_value(&report.stats)
            .map_err(|e| StageError::FormattingFailed(e.to_string()))?;

        tracing::info!(
            records = report.cleaned_data.len(),
            warnings = report.warnings.len(),
            "data formatted and validated"
        );
        state.formatted_data = report.cleaned_data;
        state.extend_warnings(report.warnings);
        state.annotate("validation_stats", stats);
        Ok(())
    }
}
