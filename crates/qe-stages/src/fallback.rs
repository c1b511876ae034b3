//! Placeholder rows used when the real query could not be executed
use qe_core::{IntentType, Record};
use serde_json::{json, Value};

/// Intent-shaped placeholder rows. Pure; never fails.
pub fn fallback_rows(intent_type: &IntentType, metric: &str, dimension: Option<&str>) -> Vec<Record> {
    match (intent_type, dimension) {
        (IntentType::Summary, Some(dimension)) => vec![
            row([(dimension, json!("No Data Available")), (metric, json!(0))]),
            row([(dimension, json!("System Error")), (metric, json!(0))]),
        ],
        (IntentType::Summary, None) => vec![row([(metric, json!(0)), ("status", json!("error"))])],
        (IntentType::Trend, _) => ["2024-01", "2024-02", "2024-03"]
            .into_iter()
            .map(|period| row([("period", json!(period)), (metric, json!(0))]))
            .collect(),
        (IntentType::Comparison, Some(dimension)) => ["Category A", "Category B", "Category C"]
            .into_iter()
            .map(|label| row([(dimension, json!(label)), (metric, json!(0))]))
            .collect(),
        (IntentType::Comparison, None) => vec![row([
            ("comparison", json!("No data available")),
            (metric, json!(0)),
        ])],
        (IntentType::Other(_), _) => vec![
            row([
                ("error", json!(true)),
                ("message", json!("Data temporarily unavailable")),
            ]),
            row([
                ("error", json!(true)),
                ("info", json!("Please try again in a few moments")),
            ]),
        ],
    }
}

fn row<const N: usize>(fields: [(&str, Value); N]) -> Record {
    fields
        .into_iter()
        .map(|(field, value)| (field.to_string(), value))
        .collect()
}
