//! Scalar value normalisation
use serde_json::{Number, Value};

/// Normalise one scalar coming back from the data store.
///
/// - `null`, `""` and `"NULL"` become `null`
/// - numeric strings become integers, or floats when they contain a `.`
/// - `true`/`yes`/`false`/`no` (any case) become booleans
/// - other strings are trimmed; non-string values pass through
pub fn clean_value(value: &Value) -> Value {
    let Value::String(raw) = value else {
        return value.clone();
    };

    if raw.is_empty() || raw == "NULL" {
        return Value::Null;
    }

    let trimmed = raw.trim();
    if let Some(number) = parse_number(trimmed) {
        return Value::Number(number);
    }

    match trimmed.to_lowercase().as_str() {
        "true" | "yes" | "1" => Value::Bool(true),
        "false" | "no" | "0" => Value::Bool(false),
        _ => Value::String(trimmed.to_string()),
    }
}

fn parse_number(text: &str) -> Option<Number> {
    if text.contains('.') {
        return text.parse::<f64>().ok().and_then(Number::from_f64);
    }
    if let Ok(int) = text.parse::<i64>() {
        return Some(Number::from(int));
    }
    text.parse::<u64>().ok().map(Number::from)
}
