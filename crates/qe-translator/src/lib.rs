//! Query Engine Translator: structured intent → SQL
//!
//! The translator asks a text-generation service for SQL and post-processes
//! the reply. Any generation failure falls back to a deterministic query, so
//! callers always get a usable statement.

pub mod client;
pub mod prompt;

pub use client::ChatCompletionClient;
pub use prompt::{GenerationRequest, SCHEMA_DESCRIPTION, SYSTEM_INSTRUCTIONS};

use once_cell::sync::Lazy;
use qe_core::IntentType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)```(?:sql)?").expect("valid fence pattern"));

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenerationError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Boundary to the text-generation service
pub trait TextGenerator: Send + Sync {
    fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlSource {
    Generated,
    Fallback,
}

impl SqlSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub sql: String,
    pub source: SqlSource,
}

pub struct QueryTranslator {
    generator: Option<Box<dyn TextGenerator>>,
}

impl QueryTranslator {
    pub fn new(generator: Box<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    /// Translator without a generation service; always emits the fallback query.
    pub fn deterministic() -> Self {
        Self { generator: None }
    }

    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    pub fn generate(
        &self,
        intent_type: &IntentType,
        metric: &str,
        dimension: Option<&str>,
        raw_prompt: &str,
        enhanced_prompt: &str,
    ) -> String {
        self.translate(intent_type, metric, dimension, raw_prompt, enhanced_prompt)
            .sql
    }

    pub fn translate(
        &self,
        intent_type: &IntentType,
        metric: &str,
        dimension: Option<&str>,
        raw_prompt: &str,
        enhanced_prompt: &str,
    ) -> Translation {
        let Some(generator) = &self.generator else {
            return Translation {
                sql: fallback_sql(metric, dimension),
                source: SqlSource::Fallback,
            };
        };

        let request =
            GenerationRequest::for_intent(intent_type, metric, dimension, raw_prompt, enhanced_prompt);

        let generated = generator.complete(&request).and_then(|text| {
            let sql = clean_sql(&text);
            if sql.is_empty() {
                Err(GenerationError::Malformed("empty SQL".to_string()))
            } else {
                Ok(sql)
            }
        });

        match generated {
            Ok(sql) => {
                tracing::info!(sql = %preview(&sql), "generated SQL");
                Translation {
                    sql,
                    source: SqlSource::Generated,
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "SQL generation failed, using fallback query");
                Translation {
                    sql: fallback_sql(metric, dimension),
                    source: SqlSource::Fallback,
                }
            }
        }
    }
}

/// Strip code fences and collapse all whitespace runs to single spaces
pub fn clean_sql(text: &str) -> String {
    let unfenced = CODE_FENCE.replace_all(text.trim(), "");
    unfenced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Deterministic query used whenever generation is unavailable
pub fn fallback_sql(metric: &str, dimension: Option<&str>) -> String {
    match dimension {
        Some(dimension) => format!(
            "SELECT {dimension}, SUM(total_amount) AS {metric} FROM sales \
             LEFT JOIN products ON sales.product_id=products.product_id \
             GROUP BY {dimension} ORDER BY {metric} DESC LIMIT 50"
        ),
        None => format!("SELECT SUM(total_amount) AS {metric} FROM sales"),
    }
}

fn preview(sql: &str) -> &str {
    let end = sql.char_indices().nth(100).map(|(i, _)| i).unwrap_or(sql.len());
    &sql[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Canned(Result<String, GenerationError>);

    impl TextGenerator for Canned {
        fn complete(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
            self.0.clone()
        }
    }

    struct Recording(Mutex<Vec<GenerationRequest>>);

    impl TextGenerator for Recording {
        fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
            self.0.lock().unwrap().push(request.clone());
            Ok("SELECT 1".to_string())
        }
    }

    #[test]
    fn test_clean_sql_strips_fences() {
        assert_eq!(
            clean_sql("```sql\nSELECT region,\n   SUM(total_amount)\nFROM sales\n```"),
            "SELECT region, SUM(total_amount) FROM sales"
        );
        assert_eq!(clean_sql("```\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(clean_sql("  SELECT\t1  "), "SELECT 1");
    }

    #[test]
    fn test_fallback_sql_shapes() {
        assert_eq!(
            fallback_sql("revenue", None),
            "SELECT SUM(total_amount) AS revenue FROM sales"
        );
        assert_eq!(
            fallback_sql("revenue", Some("category")),
            "SELECT category, SUM(total_amount) AS revenue FROM sales LEFT JOIN products ON sales.product_id=products.product_id GROUP BY category ORDER BY revenue DESC LIMIT 50"
        );
    }

    #[test]
    fn test_generated_sql_is_cleaned() {
        let translator = QueryTranslator::new(Box::new(Canned(Ok(
            "```sql\nSELECT SUM(total_amount) AS revenue\nFROM sales\n```".to_string(),
        ))));
        let translation = translator.translate(&IntentType::Summary, "revenue", None, "", "");
        assert_eq!(translation.source, SqlSource::Generated);
        assert_eq!(translation.sql, "SELECT SUM(total_amount) AS revenue FROM sales");
    }

    #[test]
    fn test_generation_failure_falls_back() {
        let translator = QueryTranslator::new(Box::new(Canned(Err(GenerationError::Service {
            status: 503,
            body: "unavailable".to_string(),
        }))));
        let translation = translator.translate(&IntentType::Comparison, "revenue", Some("region"), "", "");
        assert_eq!(translation.source, SqlSource::Fallback);
        assert!(translation.sql.starts_with("SELECT region, SUM(total_amount) AS revenue"));
    }

    #[test]
    fn test_empty_reply_falls_back() {
        let translator = QueryTranslator::new(Box::new(Canned(Ok("```sql\n```".to_string()))));
        let sql = translator.generate(&IntentType::Summary, "orders", None, "", "");
        assert_eq!(sql, "SELECT SUM(total_amount) AS orders FROM sales");
    }

    #[test]
    fn test_deterministic_translator() {
        let translator = QueryTranslator::deterministic();
        assert!(!translator.has_generator());
        let translation = translator.translate(&IntentType::Trend, "revenue", None, "", "");
        assert_eq!(translation.source, SqlSource::Fallback);
    }

    #[test]
    fn test_prompt_reaches_generator() {
        let recording = std::sync::Arc::new(Recording(Mutex::new(Vec::new())));
        struct Shared(std::sync::Arc<Recording>);
        impl TextGenerator for Shared {
            fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
                self.0.complete(request)
            }
        }

        let translator = QueryTranslator::new(Box::new(Shared(recording.clone())));
        translator.generate(&IntentType::Summary, "revenue", Some("region"), "revenue by region", "");

        let seen = recording.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].task_description.contains("Dimension: region"));
        assert_eq!(seen[0].schema_description, SCHEMA_DESCRIPTION);
    }
}
