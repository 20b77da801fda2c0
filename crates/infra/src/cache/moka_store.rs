use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::sync::Cache;
use moka::Expiry;
use querykit_common::time::{Clock, SystemClock};
use querykit_core::{CacheEntry, CacheStore};
use querykit_domain::QueryResult;

const DEFAULT_CAPACITY: u64 = 10_000;

struct EntryExpiry {
    clock: Arc<dyn Clock>,
}

impl EntryExpiry {
    fn remaining(&self, entry: &CacheEntry) -> Duration {
        Duration::from_millis(entry.expires_at_ms.saturating_sub(self.clock.millis_since_epoch()))
    }
}

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(self.remaining(value))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.remaining(value))
    }
}

/// Bounded in-memory store. Each entry expires at its own `expires_at_ms`.
#[derive(Clone)]
pub struct MokaStore {
    cache: Cache<String, CacheEntry>,
    clock: Arc<dyn Clock>,
}

impl Default for MokaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MokaStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MokaStore").field("entries", &self.cache.entry_count()).finish()
    }
}

impl MokaStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, Arc::new(SystemClock))
    }

    /// Holds at most `capacity` entries; expiry is read from each entry.
    pub fn with_capacity(capacity: u64, clock: Arc<dyn Clock>) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .expire_after(EntryExpiry { clock: Arc::clone(&clock) })
            .build();
        Self { cache, clock }
    }
}

impl CacheStore for MokaStore {
    fn get(&self, key: &str) -> QueryResult<Option<CacheEntry>> {
        // moka tracks its own monotonic clock; re-check against ours
        Ok(self.cache.get(key).filter(|entry| !entry.is_expired(self.clock.millis_since_epoch())))
    }

    fn put(&self, key: &str, entry: CacheEntry) -> QueryResult<()> {
        self.cache.insert(key.to_string(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> QueryResult<()> {
        self.cache.invalidate(key);
        Ok(())
    }
}
