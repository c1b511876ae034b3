//! Result-set validation
//!
//! Cleans every value of every record, gathers statistics and produces
//! warnings. Validation never fails the request: on an internal error the
//! original records are handed back together with a warning.

use qe_core::{QuerySignature, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::cleaner::clean_value;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("record {row} field '{field}' holds a non-scalar value")]
    NonScalar { row: usize, field: String },
}

/// Outcome of validating a result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub cleaned_data: Vec<Record>,
    pub warnings: Vec<String>,
    pub stats: ValidationStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationStats {
    pub total_records: usize,
    pub null_values: usize,
    /// Fields that held a numeric value in at least one record
    pub numeric_fields: Vec<String>,
    /// Field count of the first record
    pub field_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaCheck>,
}

/// Field-set comparison between the first record and the expected columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaCheck {
    pub valid: bool,
    pub missing_fields: Vec<String>,
    pub extra_fields: Vec<String>,
    pub actual_fields: Vec<String>,
}

pub struct ResultValidator {
    null_rate_threshold: f64,
}

impl Default for ResultValidator {
    fn default() -> Self {
        Self::new(0.10)
    }
}

impl ResultValidator {
    pub fn new(null_rate_threshold: f64) -> Self {
        Self {
            null_rate_threshold,
        }
    }

    /// Validate and clean `records` for the query described by `context`.
    pub fn validate(&self, records: &[Record], context: &QuerySignature) -> ValidationReport {
        tracing::debug!(records = records.len(), "validating result set");

        match self.try_validate(records, context) {
            Ok(report) => {
                tracing::debug!(
                    records = report.cleaned_data.len(),
                    warnings = report.warnings.len(),
                    "validation complete"
                );
                report
            }
            Err(err) => {
                tracing::warn!(error = %err, "data validation failed");
                ValidationReport {
                    is_valid: false,
                    cleaned_data: records.to_vec(),
                    warnings: vec![format!("Validation error: {}", err)],
                    stats: ValidationStats::default(),
                }
            }
        }
    }

    fn try_validate(
        &self,
        records: &[Record],
        context: &QuerySignature,
    ) -> Result<ValidationReport, ValidationError> {
        if records.is_empty() {
            return Ok(ValidationReport {
                is_valid: true,
                cleaned_data: Vec::new(),
                warnings: vec!["No data returned from query".to_string()],
                stats: ValidationStats::default(),
            });
        }

        let mut cleaned_data = Vec::with_capacity(records.len());
        let mut null_values = 0usize;
        let mut total_values = 0usize;
        let mut numeric_fields = BTreeSet::new();

        for (row, record) in records.iter().enumerate() {
            let mut cleaned = Record::new();
            for (field, value) in record {
                if value.is_array() || value.is_object() {
                    return Err(ValidationError::NonScalar {
                        row,
                        field: field.clone(),
                    });
                }

                let value = clean_value(value);
                total_values += 1;
                match &value {
                    Value::Null => null_values += 1,
                    Value::Number(_) => {
                        numeric_fields.insert(field.clone());
                    }
                    _ => {}
                }
                cleaned.insert(field.clone(), value);
            }
            cleaned_data.push(cleaned);
        }

        let mut warnings = Vec::new();
        if null_values as f64 > total_values as f64 * self.null_rate_threshold {
            warnings.push(format!(
                "High null value rate: {}/{} values",
                null_values, total_values
            ));
        }

        let mut expected = vec![context.metric.as_str()];
        if let Some(dimension) = context.dimension.as_deref() {
            expected.push(dimension);
        }
        let schema = check_fields(records, &expected);
        if !schema.valid {
            warnings.push(format!(
                "Missing expected fields: {}",
                schema.missing_fields.join(", ")
            ));
        }

        Ok(ValidationReport {
            is_valid: true,
            cleaned_data,
            warnings,
            stats: ValidationStats {
                total_records: records.len(),
                null_values,
                numeric_fields: numeric_fields.into_iter().collect(),
                field_count: records[0].len(),
                schema: Some(schema),
            },
        })
    }
}

/// Compare the first record's fields with `expected`
pub fn check_fields(records: &[Record], expected: &[&str]) -> SchemaCheck {
    let actual: BTreeSet<&str> = records
        .first()
        .map(|r| r.keys().map(String::as_str).collect())
        .unwrap_or_default();

    if records.is_empty() {
        return SchemaCheck {
            valid: true,
            missing_fields: Vec::new(),
            extra_fields: Vec::new(),
            actual_fields: Vec::new(),
        };
    }

    let expected: BTreeSet<&str> = expected.iter().copied().collect();
    let missing_fields: Vec<String> = expected.difference(&actual).map(|f| f.to_string()).collect();
    let extra_fields = actual.difference(&expected).map(|f| f.to_string()).collect();

    SchemaCheck {
        valid: missing_fields.is_empty(),
        missing_fields,
        extra_fields,
        actual_fields: actual.iter().map(|f| f.to_string()).collect(),
    }
}
