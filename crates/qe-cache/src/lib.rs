//! Query Engine Cache: TTL result cache shared by every in-flight request
//!
//! - keys are a blake3 digest over the canonical form of a [`QuerySignature`]
//! - entries expire lazily: an expired entry is evicted when it is next read,
//!   unless a replacement was written since it was read
//! - writes replace whole entries; backends guarantee per-key atomicity
//! - `max_entries` is a hard cap for writes through one `ResultCache`
//!
//! ```ignore
//! let cache = ResultCache::in_memory(&CacheConfig::default());
//! let key = cache.key_for(&signature);
//! cache.set(&key, payload, 600);
//! let (payload, hit) = cache.get(&key);
//! ```

pub mod backend;
pub mod entry;
pub mod error;
pub mod sqlite;

pub use backend::{CacheBackend, MemoryBackend};
pub use entry::{CacheEntry, CachedPayload, EntryStamp};
pub use error::{CacheError, CacheResult};
pub use sqlite::SqliteBackend;

use chrono::Utc;
use qe_core::config::{CacheBackendKind, CacheConfig};
use qe_core::{IntentType, QuerySignature};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

/// Snapshot of cache occupancy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
    pub backend_kind: String,
}

/// Derive the cache key for a query signature.
///
/// The signature is flattened into a sorted map before hashing, so the key
/// depends only on the four field values.
pub fn signature_key(signature: &QuerySignature) -> String {
    let canonical: BTreeMap<&str, Value> = BTreeMap::from([
        ("chart_type", json!(signature.chart_type)),
        ("dimension", json!(signature.dimension)),
        ("intent_type", json!(signature.intent_type.as_str())),
        ("metric", json!(signature.metric)),
    ]);
    // a map of strings and nulls always serializes
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    format!("blake3:{}", blake3::hash(&bytes))
}

pub struct ResultCache {
    backend: Box<dyn CacheBackend>,
    config: CacheConfig,
    // serializes the capacity check with the insert it makes room for
    writes: Mutex<()>,
}

impl ResultCache {
    pub fn new(backend: Box<dyn CacheBackend>, config: CacheConfig) -> Self {
        tracing::info!(backend = backend.kind(), enabled = config.enabled, "result cache initialized");
        Self {
            backend,
            config,
            writes: Mutex::new(()),
        }
    }

    pub fn in_memory(config: &CacheConfig) -> Self {
        Self::new(Box::new(MemoryBackend::new()), config.clone())
    }

    /// Build the backend named by the configuration
    pub fn from_config(config: &CacheConfig) -> CacheResult<Self> {
        let backend: Box<dyn CacheBackend> = match config.backend {
            CacheBackendKind::Memory => Box::new(MemoryBackend::new()),
            CacheBackendKind::Sqlite => match config.path.as_deref() {
                Some(path) => Box::new(SqliteBackend::open(path)?),
                None => Box::new(SqliteBackend::open_in_memory()?),
            },
        };
        Ok(Self::new(backend, config.clone()))
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn key_for(&self, signature: &QuerySignature) -> String {
        signature_key(signature)
    }

    /// Look up `key`, evicting it if expired. Backend failures are returned.
    pub fn lookup(&self, key: &str) -> CacheResult<Option<CachedPayload>> {
        if !self.config.enabled {
            return Ok(None);
        }

        match self.backend.get(key)? {
            Some(entry) if entry.is_expired(Utc::now()) => {
                self.backend.remove_if_stale(key, entry.created_at)?;
                tracing::info!(key = short(key), "cache expired");
                Ok(None)
            }
            Some(entry) => {
                tracing::info!(key = short(key), "cache hit");
                Ok(Some(entry.payload))
            }
            None => {
                tracing::info!(key = short(key), "cache miss");
                Ok(None)
            }
        }
    }

    /// `(payload, hit)`; backend failures count as a miss
    pub fn get(&self, key: &str) -> (Option<CachedPayload>, bool) {
        match self.lookup(key) {
            Ok(Some(payload)) => (Some(payload), true),
            Ok(None) => (None, false),
            Err(err) => {
                tracing::error!(error = %err, "cache get error");
                (None, false)
            }
        }
    }

    /// Store `payload` under `key` for `ttl`, making room if the cache is full.
    /// A disabled cache stores nothing.
    pub fn store(&self, key: &str, payload: CachedPayload, ttl: Duration) -> CacheResult<()> {
        if !self.config.enabled {
            tracing::debug!(key = short(key), "cache disabled, not storing");
            return Ok(());
        }

        let _guard = self.writes.lock().map_err(|_| CacheError::Poisoned)?;
        if !self.backend.contains(key)? {
            self.make_room()?;
        }
        self.backend.put(CacheEntry::new(key, payload, ttl))?;
        tracing::info!(key = short(key), ttl_secs = ttl.as_secs(), "cache set");
        Ok(())
    }

    /// `true` when the payload was stored
    pub fn set(&self, key: &str, payload: CachedPayload, ttl_secs: u64) -> bool {
        if !self.config.enabled {
            return false;
        }
        match self.store(key, payload, Duration::from_secs(ttl_secs)) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(error = %err, "cache set error");
                false
            }
        }
    }

    /// Whether a result with `record_count` rows is worth caching, and for how long
    pub fn should_cache(&self, signature: &QuerySignature, record_count: usize) -> (bool, u64) {
        if !self.config.enabled || record_count == 0 {
            return (false, 0);
        }

        let ttl = match signature.intent_type {
            IntentType::Summary => self.config.summary_ttl_secs,
            IntentType::Trend => self.config.trend_ttl_secs,
            _ => self.config.default_ttl_secs,
        };
        (true, ttl)
    }

    pub fn clear(&self) -> CacheResult<()> {
        self.backend.clear()?;
        tracing::info!("cache cleared");
        Ok(())
    }

    pub fn stats(&self) -> CacheResult<CacheStats> {
        let now = Utc::now();
        let stamps = self.backend.stamps()?;
        let expired = stamps.iter().filter(|s| s.is_expired(now)).count();

        Ok(CacheStats {
            total: stamps.len(),
            valid: stamps.len() - expired,
            expired,
            backend_kind: self.backend.kind().to_string(),
        })
    }

    fn make_room(&self) -> CacheResult<()> {
        let max = self.config.max_entries;
        if max == 0 {
            return Ok(());
        }

        let now = Utc::now();
        let mut stamps = self.backend.stamps()?;
        if stamps.len() < max {
            return Ok(());
        }

        for stamp in stamps.iter().filter(|s| s.is_expired(now)) {
            self.backend.remove_if_stale(&stamp.key, stamp.created_at)?;
        }
        stamps.retain(|s| !s.is_expired(now));

        stamps.sort_by_key(|s| s.created_at);
        let overflow = (stamps.len() + 1).saturating_sub(max);
        for stamp in stamps.iter().take(overflow) {
            tracing::debug!(key = short(&stamp.key), "evicting oldest cache entry");
            self.backend.remove_if_stale(&stamp.key, stamp.created_at)?;
        }
        Ok(())
    }
}

fn short(key: &str) -> &str {
    let end = key.char_indices().nth(20).map(|(i, _)| i).unwrap_or(key.len());
    &key[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use qe_core::Metadata;
    use serde_json::json;

    fn signature(intent: &str, dimension: Option<&str>) -> QuerySignature {
        QuerySignature {
            intent_type: IntentType::from(intent),
            metric: "revenue".to_string(),
            dimension: dimension.map(str::to_string),
            chart_type: "bar".to_string(),
        }
    }

    fn payload(rows: usize) -> CachedPayload {
        CachedPayload {
            data: (0..rows)
                .map(|i| json!({ "revenue": i }).as_object().cloned().unwrap())
                .collect(),
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_key_ignores_field_order() {
        let a: QuerySignature = serde_json::from_str(
            r#"{"intent_type":"trend","metric":"revenue","dimension":"month","chart_type":"line"}"#,
        )
        .unwrap();
        let b: QuerySignature = serde_json::from_str(
            r#"{"chart_type":"line","dimension":"month","metric":"revenue","intent_type":"trend"}"#,
        )
        .unwrap();
        assert_eq!(signature_key(&a), signature_key(&b));
        assert!(signature_key(&a).starts_with("blake3:"));
    }

    #[test]
    fn test_key_changes_with_any_field() {
        let base = signature("summary", Some("region"));
        let key = signature_key(&base);

        let mut other = base.clone();
        other.metric = "orders".to_string();
        assert_ne!(key, signature_key(&other));

        let mut other = base.clone();
        other.dimension = None;
        assert_ne!(key, signature_key(&other));

        let mut other = base.clone();
        other.chart_type = "pie".to_string();
        assert_ne!(key, signature_key(&other));

        let mut other = base;
        other.intent_type = IntentType::Trend;
        assert_ne!(key, signature_key(&other));
    }

    #[test]
    fn test_should_cache_policy() {
        let cache = ResultCache::in_memory(&CacheConfig::default());
        assert_eq!(cache.should_cache(&signature("summary", None), 0), (false, 0));
        assert_eq!(cache.should_cache(&signature("summary", None), 1), (true, 600));
        assert_eq!(cache.should_cache(&signature("trend", None), 3), (true, 300));
        assert_eq!(cache.should_cache(&signature("comparison", None), 3), (true, 180));
        assert_eq!(cache.should_cache(&signature("ranking", None), 3), (true, 180));
    }

    #[test]
    fn test_disabled_cache() {
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let cache = ResultCache::in_memory(&config);
        assert!(!cache.set("k", payload(1), 60));
        cache.store("k", payload(1), Duration::from_secs(60)).unwrap();
        assert_eq!(cache.get("k"), (None, false));
        assert_eq!(cache.stats().unwrap().total, 0);
        assert_eq!(cache.should_cache(&signature("summary", None), 5), (false, 0));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let config = CacheConfig {
            max_entries: 2,
            ..CacheConfig::default()
        };
        let cache = ResultCache::in_memory(&config);
        cache.store("a", payload(1), Duration::from_secs(60)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        cache.store("b", payload(1), Duration::from_secs(60)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        cache.store("c", payload(1), Duration::from_secs(60)).unwrap();

        assert_eq!(cache.stats().unwrap().total, 2);
        assert!(!cache.get("a").1);
        assert!(cache.get("b").1);
        assert!(cache.get("c").1);
    }

    #[test]
    fn test_capacity_prefers_expired() {
        let config = CacheConfig {
            max_entries: 2,
            ..CacheConfig::default()
        };
        let cache = ResultCache::in_memory(&config);
        cache.store("stale", payload(1), Duration::ZERO).unwrap();
        cache.store("old", payload(1), Duration::from_secs(60)).unwrap();
        cache.store("new", payload(1), Duration::from_secs(60)).unwrap();

        assert!(cache.get("old").1);
        assert!(cache.get("new").1);
    }

    #[test]
    fn test_replacing_key_does_not_evict() {
        let config = CacheConfig {
            max_entries: 1,
            ..CacheConfig::default()
        };
        let cache = ResultCache::in_memory(&config);
        cache.store("a", payload(1), Duration::from_secs(60)).unwrap();
        cache.store("a", payload(2), Duration::from_secs(60)).unwrap();
        assert_eq!(cache.get("a").0.unwrap().data.len(), 2);
    }
}
