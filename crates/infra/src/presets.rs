//! Ready-made root queryables for the document and graph APIs
//!
//! A root carries default init and headers, `log` forwarding into tracing,
//! the reqwest transport, JSON parsing and bearer auth. Document roots also
//! acquire request digests. Caching is attached when the configuration
//! enables it.
//!
//! Token and digest caches are process-wide, shared by every root.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use querykit_core::{
    Batch, BearerAuth, CacheOptions, Caching, DefaultHeaders, DefaultInit, DefaultParse,
    DigestCache, Queryable, RequestDigest, Telemetry, TokenCache, TokenProvider, TracingLog,
    UseTransport,
};
use querykit_domain::{ApiKind, ClientConfig, QueryResult};
use tracing::info;

use crate::batching::{JsonBatchCodec, MultipartBatchCodec};
use crate::cache::store_for;
use crate::digest::ContextInfoDigestSource;
use crate::http::HttpClient;

static TOKENS: Lazy<TokenCache> = Lazy::new(TokenCache::new);
static DIGESTS: Lazy<DigestCache> = Lazy::new(DigestCache::new);

fn base_root(
    config: &ClientConfig,
    defaults: DefaultHeaders,
    provider: Arc<dyn TokenProvider>,
) -> QueryResult<Queryable> {
    config.validate()?;
    let headers =
        config.headers.iter().fold(defaults, |headers, (name, value)| headers.with(name, value));

    let mut root = Queryable::new(config.base_url.trim_end_matches('/'))
        .using(DefaultInit)
        .using(headers)
        .using(TracingLog::new(config.log_level))
        .using(UseTransport::new(HttpClient::from_config(config)?))
        .using(DefaultParse)
        .using(BearerAuth::new(provider).with_cache(TOKENS.clone()));
    if let Some(tag) = &config.client_tag {
        root = root.using(Telemetry::new(tag.clone()));
    }
    Ok(root)
}

fn with_caching(root: Queryable, config: &ClientConfig) -> QueryResult<Queryable> {
    if !config.cache.enabled {
        return Ok(root);
    }
    let options = CacheOptions::new(store_for(&config.cache)?)
        .expire_after(Duration::from_secs(config.cache.expire_after_secs));
    Ok(root.using(Caching::new(options)))
}

/// Root for the document API at `config.base_url` (a web URL).
pub fn document_root(
    config: &ClientConfig,
    provider: Arc<dyn TokenProvider>,
) -> QueryResult<Queryable> {
    let root = base_root(config, DefaultHeaders::document(), provider)?;
    let digests = ContextInfoDigestSource::new(root.clone());
    let root = root.using(RequestDigest::new(Arc::new(digests), DIGESTS.clone()));
    info!(base_url = %config.base_url, "document root ready");
    with_caching(root, config)
}

/// Root for the graph API at `config.base_url` (a version root such as `/v1.0`).
pub fn graph_root(
    config: &ClientConfig,
    provider: Arc<dyn TokenProvider>,
) -> QueryResult<Queryable> {
    let root = base_root(config, DefaultHeaders::graph(), provider)?;
    info!(base_url = %config.base_url, "graph root ready");
    with_caching(root, config)
}

/// Root for whichever API `config.api` names.
pub fn root_for(config: &ClientConfig, provider: Arc<dyn TokenProvider>) -> QueryResult<Queryable> {
    match config.api {
        ApiKind::Document => document_root(config, provider),
        ApiKind::Graph => graph_root(config, provider),
    }
}

/// A copy of a document root bound to a new multipart batch.
pub fn document_batch(root: &Queryable) -> (Queryable, Batch) {
    root.batched(Arc::new(MultipartBatchCodec))
}

/// A copy of a graph root bound to a new JSON batch.
pub fn graph_batch(root: &Queryable) -> (Queryable, Batch) {
    root.batched(Arc::new(JsonBatchCodec::default()))
}
