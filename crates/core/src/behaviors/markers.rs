//! Marker headers read by the caching and batching behaviors
//!
//! Markers are set during `init` so every later moment, batching registration
//! included, can see them. Transports strip them before the wire.

use querykit_domain::constants::{
    HEADER_BATCH_NEVER, HEADER_CACHE_ALWAYS, HEADER_CACHE_NEVER, MARKER_HEADERS,
};
use querykit_domain::RequestInit;

use crate::queryable::Queryable;
use crate::timeline::{Behavior, Observer};

/// Removes every marker header from `init`.
pub fn strip_marker_headers(init: &mut RequestInit) {
    for name in MARKER_HEADERS {
        init.headers.remove(name);
    }
}

fn mark(mut target: Queryable, header: &'static str) -> Queryable {
    target.on_mut().init.prepend(Observer::init(move |_, init| {
        init.headers.set(header, "1");
        Ok(())
    }));
    target
}

/// Caches the response even when the method is not `GET`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheAlways;

impl Behavior<Queryable> for CacheAlways {
    fn apply(self, target: Queryable) -> Queryable {
        mark(target, HEADER_CACHE_ALWAYS)
    }
}

/// Opts the request out of every caching behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheNever;

impl Behavior<Queryable> for CacheNever {
    fn apply(self, target: Queryable) -> Queryable {
        mark(target, HEADER_CACHE_NEVER)
    }
}

/// Sends the request on its own even when bound to a batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchNever;

impl Behavior<Queryable> for BatchNever {
    fn apply(self, target: Queryable) -> Queryable {
        mark(target, HEADER_BATCH_NEVER)
    }
}
