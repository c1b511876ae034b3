//! Cache entries and their payloads
use chrono::{DateTime, Utc};
use qe_core::{Metadata, Record};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Data + metadata snapshot of a finished request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPayload {
    pub data: Vec<Record>,
    pub metadata: Metadata,
}

/// A stored payload. Entries are never updated in place, only replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub payload: CachedPayload,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

/// Everything about an entry except its payload
#[derive(Debug, Clone, PartialEq)]
pub struct EntryStamp {
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, payload: CachedPayload, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            payload,
            created_at: Utc::now(),
            ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        expired(self.created_at, self.ttl, now)
    }

    pub fn stamp(&self) -> EntryStamp {
        EntryStamp {
            key: self.key.clone(),
            created_at: self.created_at,
            ttl: self.ttl,
        }
    }
}

impl EntryStamp {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        expired(self.created_at, self.ttl, now)
    }
}

fn expired(created_at: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    // a clock that moved backwards counts as zero age
    let age = (now - created_at).to_std().unwrap_or(Duration::ZERO);
    age >= ttl
}
