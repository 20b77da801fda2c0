//! HTTP transport
//!
//! [`HttpClient`] implements the core `Transport` port on top of reqwest.
//! [`Fetch`] and [`FetchWithRetry`] install it as a queryable's `send`.

pub mod client;

use std::sync::Arc;
use std::time::Duration;

pub use client::{parse_retry_after, HttpClient, HttpClientBuilder};
use querykit_core::{Behavior, Queryable, UseTransport};
use querykit_domain::QueryResult;

/// Sends with a single attempt.
#[derive(Debug, Clone)]
pub struct Fetch {
    client: Arc<HttpClient>,
}

impl Fetch {
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    pub fn new() -> QueryResult<Self> {
        Ok(Self { client: Arc::new(HttpClient::builder().max_attempts(1).build()?) })
    }
}

impl Behavior<Queryable> for Fetch {
    fn apply(self, target: Queryable) -> Queryable {
        target.using(UseTransport::from_arc(self.client))
    }
}

/// Sends with retries on transient failures.
#[derive(Debug, Clone)]
pub struct FetchWithRetry {
    client: Arc<HttpClient>,
}

impl FetchWithRetry {
    /// `attempts` counts the first try.
    pub fn new(attempts: u32, backoff: Duration) -> QueryResult<Self> {
        let client = HttpClient::builder().max_attempts(attempts).base_backoff(backoff).build()?;
        Ok(Self::with_client(client))
    }

    /// Uses a preconfigured client, keeping its attempts and backoff.
    pub fn with_client(client: HttpClient) -> Self {
        Self { client: Arc::new(client) }
    }
}

impl Behavior<Queryable> for FetchWithRetry {
    fn apply(self, target: Queryable) -> Queryable {
        target.using(UseTransport::from_arc(self.client))
    }
}
