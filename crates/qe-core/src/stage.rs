//! Stage Trait: the contract every pipeline stage implements
//!
//! The topology is fixed:
//!
//! ```text
//! sql_generator → cache_checker ─hit──────────────────────────────→ cache_manager → end
//!                               └miss→ query_executor ─ok────→ data_formatter ─↗
//!                                                     └error→ error_handler ─↗
//! ```
use serde::{Serialize, Serializer};
use std::fmt;

use crate::context::RequestState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageName {
    SqlGenerator,
    CacheChecker,
    QueryExecutor,
    ErrorHandler,
    DataFormatter,
    CacheManager,
}

impl StageName {
    pub const ENTRY: StageName = StageName::SqlGenerator;

    pub const ALL: [StageName; 6] = [
        StageName::SqlGenerator,
        StageName::CacheChecker,
        StageName::QueryExecutor,
        StageName::ErrorHandler,
        StageName::DataFormatter,
        StageName::CacheManager,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SqlGenerator => "sql_generator",
            Self::CacheChecker => "cache_checker",
            Self::QueryExecutor => "query_executor",
            Self::ErrorHandler => "error_handler",
            Self::DataFormatter => "data_formatter",
            Self::CacheManager => "cache_manager",
        }
    }

    /// Transition function of the state machine; `None` once the run is over.
    pub fn next(self, state: &RequestState) -> Option<StageName> {
        match self {
            Self::SqlGenerator => Some(Self::CacheChecker),
            Self::CacheChecker if state.cache_hit => Some(Self::CacheManager),
            Self::CacheChecker => Some(Self::QueryExecutor),
            Self::QueryExecutor if state.error.is_some() => Some(Self::ErrorHandler),
            Self::QueryExecutor => Some(Self::DataFormatter),
            Self::ErrorHandler => Some(Self::DataFormatter),
            Self::DataFormatter => Some(Self::CacheManager),
            Self::CacheManager => None,
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StageName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One unit of pipeline work.
///
/// A stage mutates the state in place and reports failure through
/// `StageError`; the runner decides how each failure is recovered.
pub trait Stage: Send + Sync {
    fn name(&self) -> StageName;

    fn run(&self, state: &mut RequestState) -> Result<(), StageError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageError {
    GenerationFailed(String),
    CacheUnavailable(String),
    ExecutionFailed(String),
    FallbackFailed(String),
    FormattingFailed(String),
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::GenerationFailed(msg) => write!(f, "SQL generation failed: {}", msg),
            Self::CacheUnavailable(msg) => write!(f, "Cache unavailable: {}", msg),
            Self::ExecutionFailed(msg) => write!(f, "{}", msg),
            Self::FallbackFailed(msg) => write!(f, "Error handler failed: {}", msg),
            Self::FormattingFailed(msg) => write!(f, "Data formatting failed: {}", msg),
        }
    }
}

impl std::error::Error for StageError {}
