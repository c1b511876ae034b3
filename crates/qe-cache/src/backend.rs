//! Cache storage backends
//!
//! A backend only stores and replaces whole entries; expiry and capacity
//! policy live in [`crate::ResultCache`].
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::entry::{CacheEntry, EntryStamp};
use crate::error::CacheResult;

pub trait CacheBackend: Send + Sync {
    /// Short backend label reported in stats (e.g. `in_memory`)
    fn kind(&self) -> &'static str;

    fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>>;

    /// Insert or wholesale replace the entry for `entry.key`
    fn put(&self, entry: CacheEntry) -> CacheResult<()>;

    fn remove(&self, key: &str) -> CacheResult<()>;

    /// Remove the entry for `key` only if it is still the one created at
    /// `created_at`; a replacement written in the meantime is kept.
    fn remove_if_stale(&self, key: &str, created_at: DateTime<Utc>) -> CacheResult<()>;

    fn contains(&self, key: &str) -> CacheResult<bool>;

    fn clear(&self) -> CacheResult<()>;

    fn stamps(&self) -> CacheResult<Vec<EntryStamp>>;
}

/// Process-local backend on a sharded concurrent map
#[derive(Default)]
pub struct MemoryBackend {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheBackend for MemoryBackend {
    fn kind(&self) -> &'static str {
        "in_memory"
    }

    fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn put(&self, entry: CacheEntry) -> CacheResult<()> {
        self.entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn remove_if_stale(&self, key: &str, created_at: DateTime<Utc>) -> CacheResult<()> {
        self.entries
            .remove_if(key, |_, entry| entry.created_at == created_at);
        Ok(())
    }

    fn contains(&self, key: &str) -> CacheResult<bool> {
        Ok(self.entries.contains_key(key))
    }

    fn clear(&self) -> CacheResult<()> {
        self.entries.clear();
        Ok(())
    }

    fn stamps(&self) -> CacheResult<Vec<EntryStamp>> {
        Ok(self.entries.iter().map(|entry| entry.value().stamp()).collect())
    }
}
