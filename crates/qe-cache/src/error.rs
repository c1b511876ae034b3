use thiserror::Error;

/// Errors raised by cache backends
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt entry '{key}': {reason}")]
    Corrupt { key: String, reason: String },

    #[error("cache lock poisoned")]
    Poisoned,
}

pub type CacheResult<T> = Result<T, CacheError>;
