//! Query Engine Quality: value cleaning and result validation
//!
//! # Example
//!
//! ```ignore
//! use qe_quality::{clean_value, ResultValidator};
//!
//! assert_eq!(clean_value(&json!("42")), json!(42));
//!
//! let report = ResultValidator::default().validate(&records, &signature);
//! println!("{} records, {} warnings", report.cleaned_data.len(), report.warnings.len());
//! ```

pub mod cleaner;
pub mod validator;

pub use cleaner::clean_value;
pub use validator::{check_fields, ResultValidator, SchemaCheck, ValidationError, ValidationReport, ValidationStats};
