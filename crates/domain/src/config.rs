//! Client configuration
//!
//! Plain serde structures. Loading from the environment or a file lives in
//! `querykit_infra::config`.

use std::path::PathBuf;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CACHE_EXPIRE_SECS, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BACKOFF_MS,
    DEFAULT_TIMEOUT_MS,
};
use crate::errors::QueryError;
use crate::types::LogLevel;

/// Which REST surface a client talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKind {
    /// Document/collaboration API (`_api`, multipart `$batch`, request digests)
    #[default]
    Document,
    /// Cloud resource graph API (JSON `$batch`)
    Graph,
}

impl FromStr for ApiKind {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "document" | "sp" | "sharepoint" => Ok(Self::Document),
            "graph" => Ok(Self::Graph),
            other => Err(QueryError::Config(format!("unknown api kind '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts including the first; must be at least 1.
    pub max_attempts: u32,
    /// Delay before the first retry; later retries back off exponentially.
    pub base_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_RETRY_ATTEMPTS, base_backoff_ms: DEFAULT_RETRY_BACKOFF_MS }
    }
}

/// Where cached results are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStoreKind {
    /// In-memory, lives as long as the process
    #[default]
    Session,
    /// JSON files under `durable_path`
    Durable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Adds the strict caching behavior to preset roots.
    pub enabled: bool,
    pub expire_after_secs: u64,
    pub store: CacheStoreKind,
    /// Directory for [`CacheStoreKind::Durable`]; required by that store.
    pub durable_path: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            expire_after_secs: DEFAULT_CACHE_EXPIRE_SECS,
            store: CacheStoreKind::Session,
            durable_path: None,
        }
    }
}

/// Everything a preset needs to build a root queryable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Web URL for the document API, version root for the graph API.
    pub base_url: String,
    pub api: ApiKind,
    /// Per-attempt HTTP timeout.
    pub timeout_ms: u64,
    pub retry: RetrySettings,
    pub cache: CacheSettings,
    /// Extra headers sent with every request, after the API defaults.
    pub headers: IndexMap<String, String>,
    /// Sent as `X-ClientService-ClientTag` when set.
    pub client_tag: Option<String>,
    /// Lowest level forwarded from the `log` moment to tracing.
    pub log_level: LogLevel,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api: ApiKind::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry: RetrySettings::default(),
            cache: CacheSettings::default(),
            headers: IndexMap::new(),
            client_tag: None,
            log_level: LogLevel::Warning,
        }
    }
}

impl ClientConfig {
    /// Defaults for everything but the base URL and API.
    pub fn new(base_url: impl Into<String>, api: ApiKind) -> Self {
        Self { base_url: base_url.into(), api, ..Self::default() }
    }

    /// Rejects configurations no preset can work with.
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.base_url.trim().is_empty() {
            return Err(QueryError::Config("base_url is required".into()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(QueryError::Config(format!(
                "base_url must be absolute http(s), got '{}'",
                self.base_url
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(QueryError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.cache.store == CacheStoreKind::Durable && self.cache.durable_path.is_none() {
            return Err(QueryError::Config("durable cache requires cache.durable_path".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_backoff_ms, 200);
        assert_eq!(config.cache.expire_after_secs, 300);
        assert_eq!(config.cache.store, CacheStoreKind::Session);
    }

    #[test]
    fn validate_requires_absolute_base_url() {
        assert!(ClientConfig::default().validate().is_err());
        assert!(ClientConfig::new("/sites/dev", ApiKind::Document).validate().is_err());
        assert!(ClientConfig::new("https://contoso.example/sites/dev", ApiKind::Document)
            .validate()
            .is_ok());
    }

    #[test]
    fn durable_cache_needs_a_path() {
        let mut config = ClientConfig::new("https://graph.example/v1.0", ApiKind::Graph);
        config.cache.store = CacheStoreKind::Durable;
        assert!(matches!(config.validate(), Err(QueryError::Config(_))));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url":"https://x.example","api":"graph"}"#).unwrap();
        assert_eq!(config.api, ApiKind::Graph);
        assert_eq!(config.retry, RetrySettings::default());
    }
}
