//! Unified Error Model
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryEngineError {
    #[error("INPUT/{0}")]
    InvalidInput(String),

    #[error("GENERATION/{0}")]
    Generation(String),

    #[error("EXECUTION/{0}")]
    Execution(String),

    #[error("VALIDATION/{0}")]
    Validation(String),

    #[error("CACHE/{0}")]
    Cache(String),

    #[error("FORMAT/{0}")]
    Formatting(String),

    #[error("CONFIG/{0}")]
    Config(String),
}

impl QueryEngineError {
    /// Message without the category prefix, as surfaced in envelope metadata
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidInput(msg)
            | Self::Generation(msg)
            | Self::Execution(msg)
            | Self::Validation(msg)
            | Self::Cache(msg)
            | Self::Formatting(msg)
            | Self::Config(msg) => msg,
        }
    }
}
