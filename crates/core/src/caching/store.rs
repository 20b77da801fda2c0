//! Cache store port and the in-memory session store

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use querykit_common::cache::ExpiringMap;
use querykit_common::time::{Clock, SystemClock};
use querykit_domain::QueryResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A cached result and the epoch millisecond it expires at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    pub expires_at_ms: u64,
}

impl CacheEntry {
    pub const fn new(value: Value, expires_at_ms: u64) -> Self {
        Self { value, expires_at_ms }
    }

    /// Entries expire at `expires_at_ms` itself, not after it.
    pub const fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms <= now_ms
    }
}

/// Where caching behaviors keep results. Failures never fail the request.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> QueryResult<Option<CacheEntry>>;

    fn put(&self, key: &str, entry: CacheEntry) -> QueryResult<()>;

    fn remove(&self, key: &str) -> QueryResult<()>;
}

/// In-memory store living as long as the process.
#[derive(Clone)]
pub struct SessionStore {
    entries: ExpiringMap<String, CacheEntry, Arc<dyn Clock>>,
    clock: Arc<dyn Clock>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore").field("entries", &self.entries.len()).finish()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { entries: ExpiringMap::with_clock(Arc::clone(&clock)), clock }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for SessionStore {
    fn get(&self, key: &str) -> QueryResult<Option<CacheEntry>> {
        Ok(self.entries.get(&key.to_string()))
    }

    fn put(&self, key: &str, entry: CacheEntry) -> QueryResult<()> {
        let remaining = entry.expires_at_ms.saturating_sub(self.clock.millis_since_epoch());
        let ttl = Duration::from_millis(remaining);
        self.entries.insert(key.to_string(), entry, ttl);
        Ok(())
    }

    fn remove(&self, key: &str) -> QueryResult<()> {
        self.entries.remove(&key.to_string());
        Ok(())
    }
}

impl<S: CacheStore + ?Sized> CacheStore for Arc<S> {
    fn get(&self, key: &str) -> QueryResult<Option<CacheEntry>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, entry: CacheEntry) -> QueryResult<()> {
        (**self).put(key, entry)
    }

    fn remove(&self, key: &str) -> QueryResult<()> {
        (**self).remove(key)
    }
}
