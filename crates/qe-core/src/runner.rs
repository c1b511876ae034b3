//! Pipeline Runner: drives the stage state machine and assembles the envelope
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crate::context::RequestState;
use crate::data_model::{Metadata, QueryInput, QueryOutput, Record};
use crate::error::QueryEngineError;
use crate::stage::{Stage, StageError, StageName};

pub struct PipelineRunner {
    stages: BTreeMap<StageName, Box<dyn Stage>>,
    pipeline_id: String,
    generation_mode: String,
}

impl PipelineRunner {
    /// Build a runner; every stage of the topology must be supplied exactly once.
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Result<Self, QueryEngineError> {
        let mut by_name = BTreeMap::new();
        for stage in stages {
            let name = stage.name();
            if by_name.insert(name, stage).is_some() {
                return Err(QueryEngineError::Config(format!(
                    "stage {} registered twice",
                    name
                )));
            }
        }

        if let Some(missing) = StageName::ALL.iter().find(|n| !by_name.contains_key(*n)) {
            return Err(QueryEngineError::Config(format!(
                "stage {} is not registered",
                missing
            )));
        }

        let pipeline_id = StageName::ALL
            .iter()
            .map(StageName::as_str)
            .collect::<Vec<_>>()
            .join("→");

        Ok(Self {
            stages: by_name,
            pipeline_id,
            generation_mode: "deterministic".to_string(),
        })
    }

    /// Label reported as `generation_mode` in every envelope
    pub fn with_generation_mode(mut self, mode: impl Into<String>) -> Self {
        self.generation_mode = mode.into();
        self
    }

    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    pub fn generation_mode(&self) -> &str {
        &self.generation_mode
    }

    /// Run the state machine from the entry stage until a terminal stage completes.
    pub fn run(&self, mut state: RequestState) -> RequestState {
        let mut timings = Map::new();
        let mut current = Some(StageName::ENTRY);

        while let Some(name) = current {
            let Some(stage) = self.stages.get(&name) else {
                break;
            };

            let start = Instant::now();
            match stage.run(&mut state) {
                Ok(()) => {
                    state.mark_executed(name);
                    tracing::debug!(stage = %name, request_id = %state.request_id, "stage completed");
                }
                Err(err) => recover(name, &mut state, err),
            }
            timings.insert(
                name.as_str().to_string(),
                json!(start.elapsed().as_millis() as u64),
            );

            current = name.next(&state);
        }

        state.annotate("stage_timings_ms", Value::Object(timings));
        state
    }

    /// Process one request end to end. Always returns a well-formed envelope.
    pub fn process(&self, input: &QueryInput) -> QueryOutput {
        let start = Instant::now();
        tracing::info!(
            intent = %input.intent_type,
            metric = %input.metric,
            "starting query pipeline"
        );

        let state = match RequestState::from_input(input) {
            Ok(state) => state,
            Err(err) => {
                tracing::error!(error = %err, "query pipeline failed");
                return self.failure_envelope(input, &err, start.elapsed());
            }
        };

        match panic::catch_unwind(AssertUnwindSafe(|| self.run(state))) {
            Ok(final_state) => {
                let output = self.assemble(final_state, start.elapsed());
                tracing::info!(
                    records = output.data.len(),
                    status = output.status().unwrap_or("unknown"),
                    "query pipeline completed in {:.1}ms",
                    start.elapsed().as_secs_f64() * 1000.0
                );
                output
            }
            Err(_) => {
                let err = QueryEngineError::Execution("pipeline aborted unexpectedly".to_string());
                tracing::error!(error = %err, "query pipeline failed");
                self.failure_envelope(input, &err, start.elapsed())
            }
        }
    }

    fn assemble(&self, state: RequestState, elapsed: Duration) -> QueryOutput {
        let status = if state.error.is_some() { "error" } else { "success" };
        let error = state.error.clone();
        let nodes: Vec<&'static str> = state.nodes_executed().iter().map(StageName::as_str).collect();
        let execution_time = format_millis(state.execution_time * 1000.0);
        let chart_type = state.chart_type().to_string();
        let request_id = state.request_id.clone();

        let (data, mut metadata, warnings) = state.into_parts();

        metadata.insert("total_records".to_string(), json!(data.len()));
        metadata.insert("execution_time".to_string(), json!(execution_time));
        metadata.insert(
            "processing_time".to_string(),
            json!(format_millis(elapsed.as_secs_f64() * 1000.0)),
        );
        metadata.insert("chart_type".to_string(), json!(chart_type));
        metadata.insert("status".to_string(), json!(status));
        metadata.insert("nodes_executed".to_string(), json!(nodes));
        metadata.insert("pipeline".to_string(), json!(self.pipeline_id));
        metadata.insert("generation_mode".to_string(), json!(self.generation_mode));
        metadata.insert("request_id".to_string(), json!(request_id));
        if !warnings.is_empty() {
            metadata.insert("warnings".to_string(), json!(warnings));
        }
        if let Some(err) = error {
            metadata.insert("error".to_string(), json!(err.message()));
        }

        QueryOutput { data, metadata }
    }

    fn failure_envelope(
        &self,
        input: &QueryInput,
        err: &QueryEngineError,
        elapsed: Duration,
    ) -> QueryOutput {
        let mut record = Record::new();
        record.insert("error".to_string(), json!(true));
        record.insert("message".to_string(), json!("Query pipeline failed"));

        let mut metadata = Metadata::new();
        metadata.insert("total_records".to_string(), json!(1));
        metadata.insert("execution_time".to_string(), json!(format_millis(0.0)));
        metadata.insert(
            "processing_time".to_string(),
            json!(format_millis(elapsed.as_secs_f64() * 1000.0)),
        );
        metadata.insert("chart_type".to_string(), json!(input.chart_type));
        metadata.insert("status".to_string(), json!("error"));
        metadata.insert("nodes_executed".to_string(), json!([]));
        metadata.insert("pipeline".to_string(), json!(self.pipeline_id));
        metadata.insert("generation_mode".to_string(), json!(self.generation_mode));
        metadata.insert("error".to_string(), json!(err.to_string()));

        QueryOutput {
            data: vec![record],
            metadata,
        }
    }
}

/// Recovery policy per stage. A failing stage is never recorded in `nodes_executed`.
fn recover(stage: StageName, state: &mut RequestState, err: StageError) {
    let message = err.to_string();
    match stage {
        StageName::SqlGenerator | StageName::CacheManager => {
            tracing::warn!(stage = %stage, "{}", message);
            state.warn(message);
        }
        StageName::CacheChecker => {
            tracing::warn!(stage = %stage, "{}", message);
            state.warn(message);
            state.cache_hit = false;
            state.annotate("cache_hit", false);
        }
        StageName::QueryExecutor => {
            tracing::error!(stage = %stage, "query failed: {}", message);
            state.error = Some(QueryEngineError::Execution(message));
        }
        StageName::ErrorHandler => {
            tracing::error!(stage = %stage, "{}", message);
            let mut record = Record::new();
            record.insert("error".to_string(), json!(true));
            record.insert("message".to_string(), json!("System error - please try again"));
            state.raw_data = vec![record.clone()];
            state.formatted_data = vec![record];
            state.annotate("status", "error");
            state.annotate("error_handler_failed", true);
        }
        StageName::DataFormatter => {
            tracing::error!(stage = %stage, "{}", message);
            state.error = Some(QueryEngineError::Formatting(message));
        }
    }
}

fn format_millis(ms: f64) -> String {
    format!("{:.1}ms", ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_model::QueryInput;

    struct Scripted {
        name: StageName,
        fail: bool,
    }

    impl Stage for Scripted {
        fn name(&self) -> StageName {
            self.name
        }

        fn run(&self, state: &mut RequestState) -> Result<(), StageError> {
            if self.fail && self.name == StageName::DataFormatter {
                return Err(StageError::FormattingFailed("bad record".to_string()));
            }
            if self.fail {
                return Err(StageError::ExecutionFailed("Database error: no such table: sales".to_string()));
            }
            if self.name == StageName::ErrorHandler {
                state.error = None;
            }
            if self.name == StageName::DataFormatter {
                let mut row = Record::new();
                row.insert("revenue".to_string(), json!(10));
                state.formatted_data = vec![row];
            }
            Ok(())
        }
    }

    fn runner(failing: Option<StageName>) -> PipelineRunner {
        let stages = StageName::ALL
            .iter()
            .map(|&name| {
                Box::new(Scripted {
                    name,
                    fail: Some(name) == failing,
                }) as Box<dyn Stage>
            })
            .collect();
        PipelineRunner::new(stages).unwrap()
    }

    #[test]
    fn test_missing_stage_rejected() {
        let stages: Vec<Box<dyn Stage>> = vec![Box::new(Scripted {
            name: StageName::SqlGenerator,
            fail: false,
        })];
        assert!(matches!(
            PipelineRunner::new(stages),
            Err(QueryEngineError::Config(_))
        ));
    }

    #[test]
    fn test_happy_path_trace() {
        let output = runner(None).process(&QueryInput::new("summary", "revenue"));
        assert_eq!(
            output.nodes_executed(),
            ["sql_generator", "cache_checker", "query_executor", "data_formatter", "cache_manager"]
        );
        assert_eq!(output.status(), Some("success"));
        assert_eq!(output.metadata["total_records"], json!(1));
        assert_eq!(output.metadata["generation_mode"], json!("deterministic"));
    }

    #[test]
    fn test_generation_mode_on_every_envelope() {
        let runner = runner(None).with_generation_mode("llm");
        let ok = runner.process(&QueryInput::new("summary", "revenue"));
        let failed = runner.process(&QueryInput::new("summary", ""));
        assert_eq!(ok.metadata["generation_mode"], json!("llm"));
        assert_eq!(failed.metadata["generation_mode"], json!("llm"));
    }

    #[test]
    fn test_execution_failure_routes_through_error_handler() {
        let output = runner(Some(StageName::QueryExecutor)).process(&QueryInput::new("summary", "revenue"));
        assert_eq!(
            output.nodes_executed(),
            ["sql_generator", "cache_checker", "error_handler", "data_formatter", "cache_manager"]
        );
        assert_eq!(output.status(), Some("success"));
    }

    #[test]
    fn test_formatter_failure_sets_error() {
        let output = runner(Some(StageName::DataFormatter)).process(&QueryInput::new("trend", "revenue"));
        assert_eq!(output.status(), Some("error"));
        assert!(!output.nodes_executed().contains(&"data_formatter".to_string()));
        assert_eq!(output.nodes_executed().last().map(String::as_str), Some("cache_manager"));
        assert!(output.metadata["error"].as_str().unwrap().contains("Data formatting failed"));
    }

    #[test]
    fn test_invalid_input_yields_error_envelope() {
        let output = runner(None).process(&QueryInput::new("summary", ""));
        assert_eq!(output.status(), Some("error"));
        assert_eq!(output.data.len(), 1);
        assert_eq!(output.metadata["total_records"], json!(1));
        assert_eq!(output.data[0]["error"], json!(true));
    }
}
