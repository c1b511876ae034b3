//! Query Engine Store: runs SQL statements and materialises the rows
//!
//! `QueryStore` is the boundary to the relational engine. Implementations
//! never fail past this boundary: every error comes back as an unsuccessful
//! [`ExecutionOutcome`] with no rows.

pub mod sqlite;

pub use sqlite::SqliteStore;

use qe_core::Record;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database error: {0}")]
    Unsupported(String),
}

/// Result of executing one statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub data: Vec<Record>,
    /// Wall-clock seconds
    pub execution_time: f64,
    pub record_count: usize,
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn succeeded(data: Vec<Record>, execution_time: f64) -> Self {
        Self {
            success: true,
            record_count: data.len(),
            data,
            execution_time,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>, execution_time: f64) -> Self {
        Self {
            success: false,
            data: Vec::new(),
            execution_time,
            record_count: 0,
            error: Some(error.into()),
        }
    }
}

pub trait QueryStore: Send + Sync {
    fn execute(&self, sql: &str) -> ExecutionOutcome;
}
