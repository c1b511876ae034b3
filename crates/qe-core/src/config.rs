//! Engine configuration
//!
//! Loaded from YAML, then patched from the environment. Every field has a
//! default so an empty document is a valid configuration.
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::QueryEngineError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub generation: GenerationConfig,
    pub validation: ValidationConfig,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub busy_timeout_ms: u64,
    /// Open the data store read-only
    pub read_only: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "test_dashboard.db".to_string(),
            busy_timeout_ms: 30_000,
            read_only: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackendKind {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub backend: CacheBackendKind,
    /// Database file for the sqlite backend
    pub path: Option<String>,
    pub max_entries: usize,
    pub summary_ttl_secs: u64,
    pub trend_ttl_secs: u64,
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackendKind::Memory,
            path: None,
            max_entries: 1000,
            summary_ttl_secs: 600,
            trend_ttl_secs: 300,
            default_ttl_secs: 180,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// OpenAI-compatible chat completions base URL
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key: None,
            temperature: 0.1,
            max_tokens: 4000,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Share of null values above which a warning is emitted
    pub null_rate_threshold: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            null_rate_threshold: 0.10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8787".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, QueryEngineError> {
        serde_yaml::from_str(yaml).map_err(|e| QueryEngineError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, QueryEngineError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            QueryEngineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&yaml)
    }

    /// Apply `QE_*` / `LLM_*` / `GROQ_API_KEY` overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self, QueryEngineError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, QueryEngineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("QE_DATABASE_PATH") {
            self.database.path = path;
        }
        if let Some(enabled) = lookup("QE_CACHE_ENABLED") {
            self.cache.enabled = enabled.eq_ignore_ascii_case("true");
        }
        if let Some(ttl) = lookup("QE_CACHE_TTL") {
            self.cache.default_ttl_secs = parse_var("QE_CACHE_TTL", &ttl)?;
        }
        if let Some(level) = lookup("QE_LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        if let Some(addr) = lookup("QE_ADDR") {
            self.server.addr = addr;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.generation.model = model;
        }
        if let Some(temperature) = lookup("LLM_TEMPERATURE") {
            self.generation.temperature = parse_var("LLM_TEMPERATURE", &temperature)?;
        }
        if let Some(max_tokens) = lookup("LLM_MAX_TOKENS") {
            self.generation.max_tokens = parse_var("LLM_MAX_TOKENS", &max_tokens)?;
        }
        if let Some(key) = lookup("GROQ_API_KEY").filter(|k| !k.is_empty()) {
            self.generation.api_key = Some(key);
        }
        Ok(self)
    }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T, QueryEngineError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| QueryEngineError::Config(format!("{}={}: {}", name, raw, e)))
}
