//! Data Model: intents, records and the input/output envelopes
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One row of a result set: field name → scalar value, in column order.
pub type Record = Map<String, Value>;

/// Free-form annotations accumulated across stages.
pub type Metadata = Map<String, Value>;

/// Kind of analysis the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IntentType {
    Summary,
    Trend,
    Comparison,
    /// Any other intent label, kept verbatim
    Other(String),
}

impl IntentType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Summary => "summary",
            Self::Trend => "trend",
            Self::Comparison => "comparison",
            Self::Other(label) => label,
        }
    }
}

impl From<String> for IntentType {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "summary" => Self::Summary,
            "trend" => Self::Trend,
            "comparison" => Self::Comparison,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for IntentType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<IntentType> for String {
    fn from(value: IntentType) -> Self {
        value.as_str().to_string()
    }
}

impl Default for IntentType {
    fn default() -> Self {
        Self::Summary
    }
}

impl fmt::Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input envelope handed over by the intent resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryInput {
    #[serde(default)]
    pub intent_type: IntentType,
    /// Required; an empty metric is rejected when the request state is built
    #[serde(default)]
    pub metric: String,
    #[serde(default)]
    pub dimension: Option<String>,
    #[serde(default = "default_chart_type")]
    pub chart_type: String,
    #[serde(default)]
    pub raw_prompt: String,
    #[serde(default)]
    pub enhanced_prompt: String,
}

fn default_chart_type() -> String {
    "bar".to_string()
}

impl QueryInput {
    pub fn new(intent_type: impl Into<IntentType>, metric: impl Into<String>) -> Self {
        Self {
            intent_type: intent_type.into(),
            metric: metric.into(),
            dimension: None,
            chart_type: default_chart_type(),
            raw_prompt: String::new(),
            enhanced_prompt: String::new(),
        }
    }

    pub fn with_dimension(mut self, dimension: impl Into<String>) -> Self {
        self.dimension = Some(dimension.into());
        self
    }

    pub fn with_chart_type(mut self, chart_type: impl Into<String>) -> Self {
        self.chart_type = chart_type.into();
        self
    }

    pub fn with_prompts(mut self, raw: impl Into<String>, enhanced: impl Into<String>) -> Self {
        self.raw_prompt = raw.into();
        self.enhanced_prompt = enhanced.into();
        self
    }
}

/// Output envelope for the visualization consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutput {
    pub data: Vec<Record>,
    pub metadata: Metadata,
}

impl QueryOutput {
    pub fn status(&self) -> Option<&str> {
        self.metadata.get("status").and_then(Value::as_str)
    }

    pub fn nodes_executed(&self) -> Vec<String> {
        self.metadata
            .get("nodes_executed")
            .and_then(Value::as_array)
            .map(|nodes| {
                nodes
                    .iter()
                    .filter_map(|n| n.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// The four intent fields that identify a cacheable query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuerySignature {
    pub intent_type: IntentType,
    pub metric: String,
    pub dimension: Option<String>,
    pub chart_type: String,
}
