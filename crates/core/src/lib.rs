//! # QueryKit Core
//!
//! The request composition engine - no HTTP client, no file system.
//!
//! This crate contains:
//! - The Timeline engine: moments, combinators and the copy-on-write observer registry
//! - [`Queryable`], the Timeline specialization for one HTTP-like request
//! - Behaviors attached through [`Queryable::using`]
//! - Batching and caching
//! - Ports (traits) implemented by `querykit-infra`
//!
//! ## Architecture Principles
//! - Only depends on `querykit-common` and `querykit-domain`
//! - Network and storage access via traits
//! - Executions run on the ambient tokio runtime

pub mod auth;
pub mod batching;
pub mod behaviors;
pub mod caching;
pub mod queryable;
pub mod timeline;
pub mod transport;

// Re-export specific items to avoid ambiguity
pub use auth::{
    AccessToken, BearerAuth, BearerToken, Digest, DigestCache, DigestSource, RequestDigest,
    TokenCache, TokenProvider,
};
pub use batching::{Batch, BatchBinding, BatchCodec, BatchRequest, BatchSegment, BatchState};
pub use behaviors::{
    BatchNever, CacheAlways, CacheNever, DefaultHeaders, DefaultInit, DefaultParse,
    InjectHeaders, JsonHeaderParse, Telemetry, TextParse, TracingLog,
};
pub use caching::{
    CacheEntry, CacheOptions, CacheStore, Caching, CachingPessimisticRefresh, SessionStore,
};
pub use queryable::{
    AuthArgs, Execution, Extensions, ParseArgs, PostArgs, PreArgs, QueryMoments, QueryParams,
    Queryable, RequestContext,
};
pub use timeline::{Behavior, Combinator, Moment, MomentObservers, Observer, ObserverId, Timeline};
pub use transport::{Transport, UseTransport};
