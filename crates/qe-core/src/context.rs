//! Request State: the unit of work threaded through every stage
//!
//! The runner creates one `RequestState` per invocation and owns it for the
//! whole run; stages borrow it mutably for the duration of their own call.
//! Input fields are read-only once built, `metadata` only grows by merging,
//! and `warnings` / `nodes_executed` are append-only.
use serde_json::Value;

use crate::data_model::{IntentType, Metadata, QueryInput, QuerySignature, Record};
use crate::error::QueryEngineError;
use crate::stage::StageName;

#[derive(Debug, Clone)]
pub struct RequestState {
    pub request_id: String,

    intent_type: IntentType,
    metric: String,
    dimension: Option<String>,
    chart_type: String,
    raw_prompt: String,
    enhanced_prompt: String,

    pub sql_query: String,
    pub cache_key: String,
    pub cache_hit: bool,
    /// Seconds spent executing the statement
    pub execution_time: f64,
    pub raw_data: Vec<Record>,
    pub formatted_data: Vec<Record>,
    pub error: Option<QueryEngineError>,

    metadata: Metadata,
    warnings: Vec<String>,
    nodes_executed: Vec<StageName>,
}

impl RequestState {
    pub fn from_input(input: &QueryInput) -> Result<Self, QueryEngineError> {
        let metric = input.metric.trim();
        if metric.is_empty() {
            return Err(QueryEngineError::InvalidInput(
                "metric is required".to_string(),
            ));
        }

        let dimension = input
            .dimension
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        Ok(Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            intent_type: input.intent_type.clone(),
            metric: metric.to_string(),
            dimension,
            chart_type: input.chart_type.clone(),
            raw_prompt: input.raw_prompt.clone(),
            enhanced_prompt: input.enhanced_prompt.clone(),
            sql_query: String::new(),
            cache_key: String::new(),
            cache_hit: false,
            execution_time: 0.0,
            raw_data: Vec::new(),
            formatted_data: Vec::new(),
            error: None,
            metadata: Metadata::new(),
            warnings: Vec::new(),
            nodes_executed: Vec::new(),
        })
    }

    pub fn intent_type(&self) -> &IntentType {
        &self.intent_type
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn dimension(&self) -> Option<&str> {
        self.dimension.as_deref()
    }

    pub fn chart_type(&self) -> &str {
        &self.chart_type
    }

    pub fn raw_prompt(&self) -> &str {
        &self.raw_prompt
    }

    pub fn enhanced_prompt(&self) -> &str {
        &self.enhanced_prompt
    }

    pub fn signature(&self) -> QuerySignature {
        QuerySignature {
            intent_type: self.intent_type.clone(),
            metric: self.metric.clone(),
            dimension: self.dimension.clone(),
            chart_type: self.chart_type.clone(),
        }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Set a single metadata key, keeping every other annotation
    pub fn annotate(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Merge a batch of annotations; incoming keys win
    pub fn merge_metadata(&mut self, other: Metadata) {
        for (key, value) in other {
            self.metadata.insert(key, value);
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn extend_warnings<I>(&mut self, messages: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.warnings.extend(messages);
    }

    pub fn nodes_executed(&self) -> &[StageName] {
        &self.nodes_executed
    }

    pub(crate) fn mark_executed(&mut self, stage: StageName) {
        self.nodes_executed.push(stage);
    }

    /// Consume the state, yielding the pieces the runner assembles into the envelope
    pub(crate) fn into_parts(self) -> (Vec<Record>, Metadata, Vec<String>) {
        (self.formatted_data, self.metadata, self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejects_blank_metric() {
        let input = QueryInput::new("summary", "   ");
        let err = RequestState::from_input(&input).unwrap_err();
        assert!(matches!(err, QueryEngineError::InvalidInput(_)));
    }

    #[test]
    fn test_empty_dimension_is_absent() {
        let input = QueryInput::new("trend", "revenue").with_dimension("");
        let state = RequestState::from_input(&input).unwrap();
        assert_eq!(state.dimension(), None);
    }

    #[test]
    fn test_metadata_merges() {
        let input = QueryInput::new("summary", "revenue");
        let mut state = RequestState::from_input(&input).unwrap();
        state.annotate("cache_hit", false);
        let mut extra = Metadata::new();
        extra.insert("query".to_string(), json!("SELECT 1"));
        state.merge_metadata(extra);

        assert_eq!(state.metadata()["cache_hit"], json!(false));
        assert_eq!(state.metadata()["query"], json!("SELECT 1"));
    }
}
