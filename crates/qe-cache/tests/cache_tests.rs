//! Behaviour of the result cache through its public API, on both backends.

use chrono::{DateTime, Utc};
use qe_cache::{
    CacheBackend, CacheEntry, CacheResult, CachedPayload, EntryStamp, MemoryBackend, ResultCache,
};
use qe_core::config::{CacheBackendKind, CacheConfig};
use qe_core::{IntentType, Metadata, QuerySignature};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn payload(label: &str) -> CachedPayload {
    let mut metadata = Metadata::new();
    metadata.insert("validation_stats".to_string(), json!({ "total_records": 1 }));
    CachedPayload {
        data: vec![json!({ "region": label, "revenue": 42 }).as_object().cloned().unwrap()],
        metadata,
    }
}

fn sqlite_config(path: &str) -> CacheConfig {
    CacheConfig {
        backend: CacheBackendKind::Sqlite,
        path: Some(path.to_string()),
        ..CacheConfig::default()
    }
}

// =============================================================================
// Round trip and expiry
// =============================================================================

#[test]
fn test_set_then_get_within_ttl() {
    let cache = ResultCache::in_memory(&CacheConfig::default());
    assert!(cache.set("k1", payload("North"), 600));

    let (found, hit) = cache.get("k1");
    assert!(hit);
    assert_eq!(found, Some(payload("North")));
}

#[test]
fn test_expired_entry_is_evicted_on_access() {
    let cache = ResultCache::in_memory(&CacheConfig::default());
    cache.store("k1", payload("North"), Duration::from_millis(20)).unwrap();
    assert_eq!(cache.stats().unwrap().valid, 1);

    thread::sleep(Duration::from_millis(40));
    let stats = cache.stats().unwrap();
    assert_eq!((stats.total, stats.expired), (1, 1));

    assert_eq!(cache.get("k1"), (None, false));
    assert_eq!(cache.stats().unwrap().total, 0);
}

#[test]
fn test_clear_and_stats() {
    let cache = ResultCache::in_memory(&CacheConfig::default());
    cache.set("a", payload("a"), 60);
    cache.set("b", payload("b"), 60);

    let stats = cache.stats().unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.valid, 2);
    assert_eq!(stats.backend_kind, "in_memory");

    cache.clear().unwrap();
    assert_eq!(cache.stats().unwrap().total, 0);
}

// =============================================================================
// Concurrency
// =============================================================================

/// Memory backend that lets another writer replace an entry right after a
/// reader has fetched it
struct RacingWriter {
    inner: MemoryBackend,
    pending: Mutex<Option<CacheEntry>>,
}

impl CacheBackend for RacingWriter {
    fn kind(&self) -> &'static str {
        self.inner.kind()
    }

    fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        let found = self.inner.get(key)?;
        if let Some(entry) = self.pending.lock().unwrap().take() {
            self.inner.put(entry)?;
        }
        Ok(found)
    }

    fn put(&self, entry: CacheEntry) -> CacheResult<()> {
        self.inner.put(entry)
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        self.inner.remove(key)
    }

    fn remove_if_stale(&self, key: &str, created_at: DateTime<Utc>) -> CacheResult<()> {
        self.inner.remove_if_stale(key, created_at)
    }

    fn contains(&self, key: &str) -> CacheResult<bool> {
        self.inner.contains(key)
    }

    fn clear(&self) -> CacheResult<()> {
        self.inner.clear()
    }

    fn stamps(&self) -> CacheResult<Vec<EntryStamp>> {
        self.inner.stamps()
    }
}

#[test]
fn test_expiry_does_not_evict_concurrent_replacement() {
    let inner = MemoryBackend::new();
    inner
        .put(CacheEntry::new("k1", payload("old"), Duration::ZERO))
        .unwrap();
    thread::sleep(Duration::from_millis(2));
    let backend = RacingWriter {
        inner,
        pending: Mutex::new(Some(CacheEntry::new(
            "k1",
            payload("fresh"),
            Duration::from_secs(600),
        ))),
    };
    let cache = ResultCache::new(Box::new(backend), CacheConfig::default());

    // reader sees the expired entry while the fresh one lands behind it
    assert_eq!(cache.get("k1"), (None, false));

    assert_eq!(cache.stats().unwrap().total, 1);
    assert_eq!(cache.get("k1"), (Some(payload("fresh")), true));
}

#[test]
fn test_concurrent_new_keys_respect_capacity() {
    let config = CacheConfig {
        max_entries: 4,
        ..CacheConfig::default()
    };
    let cache = Arc::new(ResultCache::in_memory(&config));

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for round in 0..25 {
                    let key = format!("w{}-{}", worker, round);
                    assert!(cache.set(&key, payload(&key), 60));
                    assert!(cache.stats().unwrap().total <= 4);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(cache.stats().unwrap().total, 4);
}

#[test]
fn test_concurrent_writers_do_not_corrupt_entries() {
    let cache = Arc::new(ResultCache::in_memory(&CacheConfig::default()));

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for round in 0..50 {
                    let key = format!("key-{}", round % 5);
                    cache.set(&key, payload(&format!("w{}", worker)), 60);
                    let (found, hit) = cache.get(&key);
                    assert!(hit);
                    assert_eq!(found.unwrap().data.len(), 1);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(cache.stats().unwrap().total, 5);
}

// =============================================================================
// SQLite backend
// =============================================================================

#[test]
fn test_sqlite_backend_persists_across_instances() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let signature = QuerySignature {
        intent_type: IntentType::Summary,
        metric: "revenue".to_string(),
        dimension: Some("region".to_string()),
        chart_type: "bar".to_string(),
    };

    {
        let cache = ResultCache::from_config(&sqlite_config(&path)).unwrap();
        let key = cache.key_for(&signature);
        assert!(cache.set(&key, payload("West"), 600));
    }

    let cache = ResultCache::from_config(&sqlite_config(&path)).unwrap();
    let (found, hit) = cache.get(&cache.key_for(&signature));
    assert!(hit);
    assert_eq!(found, Some(payload("West")));
    assert_eq!(cache.stats().unwrap().backend_kind, "sqlite");
}
