//! Time-bounded key/value map
//!
//! Backs the token cache, the digest cache and the session cache store. Every
//! entry carries its own time-to-live; reads drop entries that have expired.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::time::{Clock, SystemClock};

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Thread-safe map whose entries expire individually.
///
/// Clones share storage.
///
/// ```
/// use std::time::Duration;
///
/// use querykit_common::cache::ExpiringMap;
///
/// let map = ExpiringMap::new();
/// map.insert("digest", "0x1234", Duration::from_secs(60));
/// assert_eq!(map.get(&"digest"), Some("0x1234"));
/// ```
pub struct ExpiringMap<K, V, C = SystemClock> {
    entries: Arc<RwLock<HashMap<K, Entry<V>>>>,
    clock: C,
}

impl<K, V, C> fmt::Debug for ExpiringMap<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiringMap").field("len", &self.entries.read().len()).finish()
    }
}

impl<K, V, C: Clone> Clone for ExpiringMap<K, V, C> {
    fn clone(&self) -> Self {
        Self { entries: Arc::clone(&self.entries), clock: self.clock.clone() }
    }
}

impl<K, V> Default for ExpiringMap<K, V, SystemClock>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ExpiringMap<K, V, SystemClock>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<K, V, C> ExpiringMap<K, V, C>
where
    K: Eq + Hash,
    C: Clock,
{
    pub fn with_clock(clock: C) -> Self {
        Self { entries: Arc::new(RwLock::new(HashMap::new())), clock }
    }

    /// Inserts `value`, replacing any previous entry. A zero `ttl` stores nothing.
    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        if ttl.is_zero() {
            self.entries.write().remove(&key);
            return;
        }
        let expires_at = self.clock.now() + ttl;
        self.entries.write().insert(key, Entry { value, expires_at });
    }

    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let now = self.clock.now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // expired: re-check under the write lock, another writer may have refreshed it
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|entry| entry.expires_at <= now) {
            entries.remove(key);
        }
        None
    }

    /// Time left before `key` expires.
    pub fn ttl(&self, key: &K) -> Option<Duration> {
        let now = self.clock.now();
        self.entries
            .read()
            .get(key)
            .and_then(|entry| entry.expires_at.checked_duration_since(now))
            .filter(|left| !left.is_zero())
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.write().remove(key).map(|entry| entry.value)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of stored entries, expired ones included until they are read or purged.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
