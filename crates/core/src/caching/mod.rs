//! Result caching behaviors
//!
//! [`Caching`] serves unexpired entries from `pre` and skips transmission.
//! [`CachingPessimisticRefresh`] also serves cached entries immediately, then
//! re-issues the request on a detached task to refresh the store for next time.
//!
//! Only `GET` requests are cached unless marked with `CacheAlways`; `CacheNever`
//! opts a request out. Store failures are logged and otherwise ignored.

pub mod store;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use futures::future::FutureExt;
use querykit_common::time::{Clock, SystemClock};
use querykit_domain::constants::{
    DEFAULT_CACHE_EXPIRE_SECS, HEADER_ACCEPT, HEADER_CACHE_ALWAYS, HEADER_CACHE_NEVER,
};
use querykit_domain::{HttpMethod, LogLevel, QueryError, RequestInit};
use serde_json::Value;
use tracing::{debug, warn};

pub use store::{CacheEntry, CacheStore, SessionStore};

use crate::queryable::{PreArgs, PreFn, Queryable, RequestContext};
use crate::timeline::{Behavior, Observer, ObserverId};

type KeyFn = dyn Fn(&str, &RequestInit) -> String + Send + Sync;
type ExpireFn = dyn Fn(&str) -> Duration + Send + Sync;

/// Default cache key: hex blake3 of `METHOD url-lowercased accept-header`.
pub fn cache_key(url: &str, init: &RequestInit) -> String {
    let accept = init.headers.get(HEADER_ACCEPT).unwrap_or_default();
    let material = format!("{} {} {}", init.method, url.to_lowercase(), accept);
    blake3::hash(material.as_bytes()).to_hex().to_string()
}

/// Whether a request takes part in caching at all.
pub fn is_cacheable(init: &RequestInit) -> bool {
    if init.headers.contains(HEADER_CACHE_NEVER) {
        return false;
    }
    init.method == HttpMethod::Get || init.headers.contains(HEADER_CACHE_ALWAYS)
}

/// Store, expiry and key settings shared by both caching behaviors.
#[derive(Clone)]
pub struct CacheOptions {
    store: Arc<dyn CacheStore>,
    expire: Arc<ExpireFn>,
    key: Arc<KeyFn>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for CacheOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOptions").finish_non_exhaustive()
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self::new(Arc::new(SessionStore::new()))
    }
}

impl CacheOptions {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            expire: Arc::new(|_: &str| Duration::from_secs(DEFAULT_CACHE_EXPIRE_SECS)),
            key: Arc::new(cache_key),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn expire_after(mut self, ttl: Duration) -> Self {
        self.expire = Arc::new(move |_: &str| ttl);
        self
    }

    /// Picks the lifetime per request URL.
    #[must_use]
    pub fn expire_with(mut self, f: impl Fn(&str) -> Duration + Send + Sync + 'static) -> Self {
        self.expire = Arc::new(f);
        self
    }

    #[must_use]
    pub fn key_factory(
        mut self,
        f: impl Fn(&str, &RequestInit) -> String + Send + Sync + 'static,
    ) -> Self {
        self.key = Arc::new(f);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn lookup(&self, ctx: &RequestContext, key: &str) -> Option<Value> {
        let entry = match self.store.get(key) {
            Ok(entry) => entry?,
            Err(error) => {
                warn!(%key, %error, "cache read failed");
                ctx.log(format!("Cache read failed: {error}"), LogLevel::Warning);
                return None;
            }
        };
        if entry.is_expired(self.clock.millis_since_epoch()) {
            if let Err(error) = self.store.remove(key) {
                debug!(%key, %error, "removing expired cache entry failed");
            }
            return None;
        }
        Some(entry.value)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write(&self, key: &str, url: &str, value: Value) -> bool {
        let ttl = (self.expire)(url);
        let expires_at_ms = self.clock.millis_since_epoch() + ttl.as_millis() as u64;
        match self.store.put(key, CacheEntry::new(value, expires_at_ms)) {
            Ok(()) => true,
            Err(error) => {
                warn!(%key, %error, "cache write failed");
                false
            }
        }
    }
}

/// Carried from `pre` to `post` when a cacheable request missed.
struct PendingWrite {
    key: String,
    url: String,
}

fn register_post_writer(target: &mut Queryable, options: CacheOptions) {
    target.on_mut().post.append(Observer::post(move |ctx, args| {
        let pending = ctx.state().take::<PendingWrite>();
        if let Some(pending) = pending {
            if options.write(&pending.key, &pending.url, args.result.clone()) {
                ctx.log("Result written to cache", LogLevel::Verbose);
            } else {
                ctx.log("Cache write failed", LogLevel::Warning);
            }
        }
        async move { Ok(args) }
    }));
}

/// Serves unexpired cached results, skipping transmission.
#[derive(Debug, Clone, Default)]
pub struct Caching {
    options: CacheOptions,
}

impl Caching {
    pub const fn new(options: CacheOptions) -> Self {
        Self { options }
    }
}

impl Behavior<Queryable> for Caching {
    fn apply(self, mut target: Queryable) -> Queryable {
        let options = self.options;
        let reader = options.clone();
        target.on_mut().pre.append(Observer::pre(move |ctx, mut args| {
            if args.result.is_none() && is_cacheable(&args.init) {
                let key = (reader.key)(&args.url, &args.init);
                if let Some(value) = reader.lookup(&ctx, &key) {
                    ctx.log(format!("Cache hit for {}", args.url), LogLevel::Verbose);
                    args.result = Some(value);
                } else {
                    ctx.state().insert(PendingWrite { key, url: args.url.clone() });
                }
            }
            async move { Ok(args) }
        }));
        register_post_writer(&mut target, options);
        target
    }
}

/// Serves cached results immediately and refreshes them in the background.
///
/// The refresh re-issues the request with this behavior's own `pre` observer
/// removed by id. At most one refresh per key runs at a time.
#[derive(Debug, Clone, Default)]
pub struct CachingPessimisticRefresh {
    options: CacheOptions,
    in_flight: Arc<DashSet<String>>,
}

impl CachingPessimisticRefresh {
    pub fn new(options: CacheOptions) -> Self {
        Self { options, in_flight: Arc::new(DashSet::new()) }
    }

    /// Keys whose refresh has not finished yet.
    pub fn refreshing(&self) -> usize {
        self.in_flight.len()
    }
}

impl Behavior<Queryable> for CachingPessimisticRefresh {
    fn apply(self, mut target: Queryable) -> Queryable {
        let Self { options, in_flight } = self;
        let own_id = ObserverId::next();
        let reader = options.clone();
        let func: Arc<PreFn> = Arc::new(move |ctx: Arc<RequestContext>, mut args: PreArgs| {
            if args.result.is_none() && is_cacheable(&args.init) {
                let key = (reader.key)(&args.url, &args.init);
                if let Some(value) = reader.lookup(&ctx, &key) {
                    ctx.log(format!("Cache hit for {}, refreshing", args.url), LogLevel::Verbose);
                    args.result = Some(value);
                    schedule_refresh(&ctx, reader.clone(), Arc::clone(&in_flight), key, own_id);
                } else {
                    ctx.state().insert(PendingWrite { key, url: args.url.clone() });
                }
            }
            async move { Ok::<_, QueryError>(args) }.boxed()
        });
        target.on_mut().pre.append(Observer::with_id(own_id, func));
        register_post_writer(&mut target, options);
        target
    }
}

fn schedule_refresh(
    ctx: &RequestContext,
    options: CacheOptions,
    in_flight: Arc<DashSet<String>>,
    key: String,
    own_id: ObserverId,
) {
    if !in_flight.insert(key.clone()) {
        ctx.log("Refresh already in flight", LogLevel::Verbose);
        return;
    }

    let mut instance = ctx.origin().clone();
    instance.on_mut().pre.remove(own_id);
    let init = ctx.init().clone();
    let url = ctx.instance().to_request_url();
    let request_id = ctx.id();

    tokio::spawn(async move {
        // the caller's cached result settles first
        tokio::task::yield_now().await;
        let outcome = instance.invoke_with(init).await;
        match outcome {
            Ok(value) => {
                if options.write(&key, &url, value) {
                    debug!(%request_id, %url, "cache refreshed");
                }
            }
            Err(error) => warn!(%request_id, %url, %error, "cache refresh failed"),
        }
        in_flight.remove(&key);
    });
}
