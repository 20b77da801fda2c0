//! Shared constants
//!
//! Header names and defaults referenced by more than one crate.

// Marker headers, honored by behaviors and stripped before transmission
pub const HEADER_CACHE_ALWAYS: &str = "X-QueryKit-CacheAlways";
pub const HEADER_CACHE_NEVER: &str = "X-QueryKit-CacheNever";
pub const HEADER_BATCH_NEVER: &str = "X-QueryKit-BatchNever";

// Wire headers
pub const HEADER_ACCEPT: &str = "Accept";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_CACHE_CONTROL: &str = "Cache-Control";
pub const HEADER_REQUEST_DIGEST: &str = "X-RequestDigest";
pub const HEADER_CLIENT_TAG: &str = "X-ClientService-ClientTag";
pub const HEADER_RETRY_AFTER: &str = "Retry-After";

// Configuration defaults
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 200;
pub const DEFAULT_CACHE_EXPIRE_SECS: u64 = 300;
pub const DEFAULT_TOKEN_REFRESH_SKEW_SECS: u64 = 300;

/// Marker headers never sent on the wire.
pub const MARKER_HEADERS: [&str; 3] = [HEADER_CACHE_ALWAYS, HEADER_CACHE_NEVER, HEADER_BATCH_NEVER];
