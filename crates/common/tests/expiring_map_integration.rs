//! Integration tests for the expiring map

#![cfg(feature = "foundation")]

use std::time::Duration;

use querykit_common::cache::ExpiringMap;
use querykit_common::time::MockClock;

/// Validates per-entry TTLs are independent.
///
/// # Test Steps
/// 1. Insert a short-lived and a long-lived entry
/// 2. Advance past the short TTL
/// 3. Confirm only the long-lived entry survives and `ttl` reports what is left
#[test]
fn test_entries_expire_independently() {
    let clock = MockClock::new();
    let map = ExpiringMap::with_clock(clock.clone());

    map.insert("short".to_string(), "a".to_string(), Duration::from_secs(5));
    map.insert("long".to_string(), "b".to_string(), Duration::from_secs(60));

    clock.advance(Duration::from_secs(10));

    assert_eq!(map.get(&"short".to_string()), None);
    assert_eq!(map.get(&"long".to_string()), Some("b".to_string()));
    assert_eq!(map.ttl(&"long".to_string()), Some(Duration::from_secs(50)));
}

/// Validates clones share storage and purge removes only expired entries.
#[test]
fn test_clones_share_storage_and_purge() {
    let clock = MockClock::new();
    let map = ExpiringMap::with_clock(clock.clone());
    let shared = map.clone();

    for i in 0..4 {
        shared.insert(i, i * 10, Duration::from_secs(u64::from(i as u8) + 1));
    }
    assert_eq!(map.len(), 4);

    clock.advance(Duration::from_millis(2500));
    assert_eq!(map.purge_expired(), 2);
    assert_eq!(shared.len(), 2);

    map.clear();
    assert!(shared.is_empty());
}
