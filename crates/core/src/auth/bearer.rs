//! Bearer token acquisition and caching

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use querykit_common::cache::ExpiringMap;
use querykit_common::time::{Clock, SystemClock};
use querykit_domain::constants::{HEADER_AUTHORIZATION, DEFAULT_TOKEN_REFRESH_SKEW_SECS};
use querykit_domain::{LogLevel, QueryError, QueryResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::queryable::Queryable;
use crate::timeline::{Behavior, Observer};

/// A bearer token as returned by a [`TokenProvider`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self { token: token.into(), expires_on }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Acquires access tokens for a resource (`scheme://host`).
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self, resource: &str) -> QueryResult<AccessToken>;
}

/// Process-wide token cache keyed by authority.
///
/// Entries expire `refresh_skew` before the token itself does.
#[derive(Clone)]
pub struct TokenCache {
    entries: ExpiringMap<String, String, Arc<dyn Clock>>,
    clock: Arc<dyn Clock>,
    refresh_skew: Duration,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCache")
            .field("entries", &self.entries.len())
            .field("refresh_skew", &self.refresh_skew)
            .finish()
    }
}

impl TokenCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: ExpiringMap::with_clock(Arc::clone(&clock)),
            clock,
            refresh_skew: Duration::from_secs(DEFAULT_TOKEN_REFRESH_SKEW_SECS),
        }
    }

    #[must_use]
    pub const fn with_refresh_skew(mut self, skew: Duration) -> Self {
        self.refresh_skew = skew;
        self
    }

    pub fn get(&self, authority: &str) -> Option<String> {
        self.entries.get(&authority.to_ascii_lowercase())
    }

    /// Caches `token` unless it is already inside the refresh window.
    pub fn put(&self, authority: &str, token: &AccessToken) {
        let now: DateTime<Utc> = self.clock.system_time().into();
        let ttl = (token.expires_on - now)
            .to_std()
            .unwrap_or_default()
            .saturating_sub(self.refresh_skew);
        self.entries.insert(authority.to_ascii_lowercase(), token.token.clone(), ttl);
    }

    pub fn invalidate(&self, authority: &str) {
        self.entries.remove(&authority.to_ascii_lowercase());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `scheme://host[:port]` of an absolute URL.
pub fn authority_of(url: &str) -> QueryResult<String> {
    let parsed = url::Url::parse(url)
        .map_err(|e| QueryError::Auth(format!("cannot resolve authority of '{url}': {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| QueryError::Auth(format!("url '{url}' has no host")))?;
    Ok(match parsed.port() {
        Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
        None => format!("{}://{host}", parsed.scheme()),
    })
}

/// Sets a fixed `Authorization: Bearer` header.
#[derive(Clone)]
pub struct BearerToken(pub String);

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

impl Behavior<Queryable> for BearerToken {
    fn apply(self, mut target: Queryable) -> Queryable {
        let value = format!("Bearer {}", self.0);
        target.on_mut().auth.append(Observer::auth(move |_, mut args| {
            args.init.headers.set(HEADER_AUTHORIZATION, value.clone());
            async move { Ok(args) }
        }));
        target
    }
}

/// Acquires a token per request authority through a [`TokenProvider`].
#[derive(Clone)]
pub struct BearerAuth {
    provider: Arc<dyn TokenProvider>,
    cache: Option<TokenCache>,
}

impl BearerAuth {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self { provider, cache: None }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: TokenCache) -> Self {
        self.cache = Some(cache);
        self
    }
}

impl Behavior<Queryable> for BearerAuth {
    fn apply(self, mut target: Queryable) -> Queryable {
        let Self { provider, cache } = self;
        target.on_mut().auth.append(Observer::auth(move |ctx, mut args| {
            let provider = Arc::clone(&provider);
            let cache = cache.clone();
            async move {
                let authority = authority_of(&args.url)?;
                let cached = cache.as_ref().and_then(|c| c.get(&authority));
                let token = match cached {
                    Some(token) => token,
                    None => {
                        debug!(%authority, "acquiring access token");
                        ctx.log(format!("Acquiring token for {authority}"), LogLevel::Verbose);
                        let acquired = provider.token(&authority).await?;
                        if let Some(cache) = &cache {
                            cache.put(&authority, &acquired);
                        }
                        acquired.token
                    }
                };
                args.init.headers.set(HEADER_AUTHORIZATION, format!("Bearer {token}"));
                Ok(args)
            }
        }));
        target
    }
}
