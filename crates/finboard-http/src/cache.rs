//! Response cache.
//!
//! Entries expire lazily: an expired entry is evicted by the read that
//! observes it. There is no background sweep.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Cache slot for a request URL. Widgets sharing a URL share a slot.
pub fn cache_key(url: &str) -> String {
    format!("api:{url}")
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) > self.ttl
    }
}

/// Process-wide payload cache.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a live entry, evicting it if it has expired.
    pub fn get(&self, key: &str) -> Option<Value> {
        // The entry guard holds the shard lock across expiry check and removal
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(entry) if entry.get().is_expired(Instant::now()) => {
                trace!(key, "Cache entry expired");
                entry.remove();
                None
            }
            Entry::Occupied(entry) => Some(entry.get().value.clone()),
            Entry::Vacant(_) => None,
        }
    }

    /// Store a value, overwriting any existing entry.
    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    pub fn clear(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear_all(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired ones included until read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
