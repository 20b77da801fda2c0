//! Request digest (anti-forgery token) acquisition for the document API

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use querykit_common::cache::ExpiringMap;
use querykit_common::time::{Clock, SystemClock};
use querykit_domain::constants::HEADER_REQUEST_DIGEST;
use querykit_domain::{HttpMethod, LogLevel, QueryResult};

use crate::queryable::Queryable;
use crate::timeline::{Behavior, Observer};

/// A form digest and how long the server will accept it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub value: String,
    pub expires_in: Duration,
}

/// Fetches a fresh digest for a web.
#[async_trait]
pub trait DigestSource: Send + Sync {
    async fn acquire(&self, web_url: &str) -> QueryResult<Digest>;
}

/// Digests keyed by web URL.
#[derive(Clone)]
pub struct DigestCache {
    entries: ExpiringMap<String, String, Arc<dyn Clock>>,
}

impl Default for DigestCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DigestCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestCache").field("entries", &self.entries.len()).finish()
    }
}

impl DigestCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { entries: ExpiringMap::with_clock(clock) }
    }

    pub fn get(&self, web_url: &str) -> Option<String> {
        self.entries.get(&cache_key(web_url))
    }

    pub fn put(&self, web_url: &str, digest: &Digest) {
        self.entries.insert(cache_key(web_url), digest.value.clone(), digest.expires_in);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn cache_key(web_url: &str) -> String {
    web_url.trim_end_matches('/').to_ascii_lowercase()
}

/// The web a request URL belongs to: everything before `/_api/` or `/_vti_bin/`.
pub fn web_url_of(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let lower = format!("{}/", path.to_ascii_lowercase());
    ["/_api/", "/_vti_bin/"]
        .iter()
        .filter_map(|marker| lower.find(marker))
        .min()
        .filter(|index| *index <= path.len())
        .map_or_else(|| path.trim_end_matches('/').to_string(), |index| path[..index].to_string())
}

fn needs_digest(method: HttpMethod, url: &str, has_header: bool) -> bool {
    method != HttpMethod::Get
        && !has_header
        && !url.to_ascii_lowercase().contains("/_api/contextinfo")
}

/// Adds `X-RequestDigest` to mutating requests during `auth`.
#[derive(Clone)]
pub struct RequestDigest {
    source: Arc<dyn DigestSource>,
    cache: DigestCache,
}

impl RequestDigest {
    pub fn new(source: Arc<dyn DigestSource>, cache: DigestCache) -> Self {
        Self { source, cache }
    }
}

impl Behavior<Queryable> for RequestDigest {
    fn apply(self, mut target: Queryable) -> Queryable {
        let Self { source, cache } = self;
        target.on_mut().auth.append(Observer::auth(move |ctx, mut args| {
            let source = Arc::clone(&source);
            let cache = cache.clone();
            async move {
                let has_header = args.init.headers.contains(HEADER_REQUEST_DIGEST);
                if !needs_digest(args.init.method, &args.url, has_header) {
                    return Ok(args);
                }
                let web_url = web_url_of(&args.url);
                let value = match cache.get(&web_url) {
                    Some(value) => value,
                    None => {
                        ctx.log(
                            format!("Acquiring request digest for {web_url}"),
                            LogLevel::Verbose,
                        );
                        let digest = source.acquire(&web_url).await?;
                        cache.put(&web_url, &digest);
                        digest.value
                    }
                };
                args.init.headers.set(HEADER_REQUEST_DIGEST, value);
                Ok(args)
            }
        }));
        target
    }
}
