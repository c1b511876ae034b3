//! SQLite-backed cache storage.
//!
//! Entries survive restarts. Payloads are stored as JSON text, timestamps as
//! RFC 3339 strings and TTLs in milliseconds.
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::backend::CacheBackend;
use crate::entry::{CacheEntry, CachedPayload, EntryStamp};
use crate::error::{CacheError, CacheResult};

pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    pub fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> CacheResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS result_cache (
                key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                ttl_ms INTEGER NOT NULL
            );
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> CacheResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::Poisoned)
    }
}

fn parse_created_at(key: &str, raw: &str) -> CacheResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CacheError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

fn ttl_from_millis(ms: i64) -> Duration {
    Duration::from_millis(ms.max(0) as u64)
}

impl CacheBackend for SqliteBackend {
    fn kind(&self) -> &'static str {
        "sqlite"
    }

    fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        let conn = self.conn()?;
        let row: Option<(String, String, i64)> = conn
            .query_row(
                "SELECT payload, created_at, ttl_ms FROM result_cache WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((payload, created_at, ttl_ms)) = row else {
            return Ok(None);
        };

        let payload: CachedPayload = serde_json::from_str(&payload)?;
        Ok(Some(CacheEntry {
            key: key.to_string(),
            payload,
            created_at: parse_created_at(key, &created_at)?,
            ttl: ttl_from_millis(ttl_ms),
        }))
    }

    fn put(&self, entry: CacheEntry) -> CacheResult<()> {
        let payload = serde_json::to_string(&entry.payload)?;
        let ttl_ms = i64::try_from(entry.ttl.as_millis()).unwrap_or(i64::MAX);
        self.conn()?.execute(
            "INSERT OR REPLACE INTO result_cache (key, payload, created_at, ttl_ms) VALUES (?1, ?2, ?3, ?4)",
            params![entry.key, payload, entry.created_at.to_rfc3339(), ttl_ms],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        self.conn()?
            .execute("DELETE FROM result_cache WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn remove_if_stale(&self, key: &str, created_at: DateTime<Utc>) -> CacheResult<()> {
        self.conn()?.execute(
            "DELETE FROM result_cache WHERE key = ?1 AND created_at = ?2",
            params![key, created_at.to_rfc3339()],
        )?;
        Ok(())
    }

    fn contains(&self, key: &str) -> CacheResult<bool> {
        let found: Option<i64> = self
            .conn()?
            .query_row(
                "SELECT 1 FROM result_cache WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn clear(&self) -> CacheResult<()> {
        self.conn()?.execute("DELETE FROM result_cache", [])?;
        Ok(())
    }

    fn stamps(&self) -> CacheResult<Vec<EntryStamp>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key, created_at, ttl_ms FROM result_cache")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(key, created_at, ttl_ms)| {
                let created_at = parse_created_at(&key, &created_at)?;
                Ok(EntryStamp {
                    key,
                    created_at,
                    ttl: ttl_from_millis(ttl_ms),
                })
            })
            .collect()
    }
}
