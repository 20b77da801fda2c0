use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use querykit_common::resilience::{
    retry_with_policy, Jitter, RetryConfig, RetryDecision, RetryError,
};
use querykit_core::Transport;
use querykit_domain::constants::HEADER_RETRY_AFTER;
use querykit_domain::{
    ClientConfig, Headers, QueryError, QueryResult, RawResponse, RequestInit,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as ReqwestClient, Method};
use tracing::debug;

use crate::errors::InfraError;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// HTTP transport with built-in retry and timeout support.
///
/// Network failures, timeouts and 429/503/504 responses are retried with
/// exponential backoff; a `Retry-After` header overrides the computed delay.
/// When attempts run out on a throttled response, that response is returned
/// so `parse` can report it.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    retry: RetryConfig,
    max_retry_after: Duration,
}

/// One failed attempt, with the response when the failure was a status code.
#[derive(Debug)]
struct Attempt {
    error: QueryError,
    retry_after: Option<Duration>,
    response: Option<RawResponse>,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> QueryResult<Self> {
        Self::builder().build()
    }

    /// Timeout, attempts and backoff taken from a client configuration.
    pub fn from_config(config: &ClientConfig) -> QueryResult<Self> {
        Self::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .max_attempts(config.retry.max_attempts)
            .base_backoff(Duration::from_millis(config.retry.base_backoff_ms))
            .build()
    }

    pub const fn max_attempts(&self) -> u32 {
        self.retry.max_attempts
    }

    /// Execute one request with retry semantics.
    pub async fn execute(&self, url: &str, init: &RequestInit) -> QueryResult<RawResponse> {
        let max_retry_after = self.max_retry_after;
        let policy = move |attempt: &Attempt, _: u32| {
            if !attempt.error.is_retryable() {
                return RetryDecision::Stop;
            }
            match attempt.retry_after {
                Some(delay) if delay > max_retry_after => RetryDecision::Stop,
                Some(delay) => RetryDecision::RetryAfter(delay),
                None => RetryDecision::Retry,
            }
        };

        let outcome =
            retry_with_policy(self.retry.clone(), policy, || self.attempt(url, init)).await;
        match outcome {
            Ok(response) => Ok(response),
            Err(RetryError::InvalidConfiguration { message }) => Err(QueryError::Config(message)),
            Err(error) => match error.into_last_error() {
                Some(Attempt { response: Some(response), .. }) => Ok(response),
                Some(Attempt { error, .. }) => Err(error),
                None => Err(QueryError::Timeout("retry time budget exceeded".into())),
            },
        }
    }

    async fn attempt(&self, url: &str, init: &RequestInit) -> Result<RawResponse, Attempt> {
        let request = self.build_request(url, init).map_err(|error| Attempt {
            error,
            retry_after: None,
            response: None,
        })?;

        debug!(method = %init.method, %url, "sending HTTP request");
        let response = self.client.execute(request).await.map_err(|err| {
            debug!(method = %init.method, %url, error = %err, "HTTP request failed");
            Attempt { error: InfraError::from(err).into(), retry_after: None, response: None }
        })?;

        let status = response.status();
        debug!(method = %init.method, %url, %status, "received HTTP response");
        let raw = read_response(response).await.map_err(|error| Attempt {
            error,
            retry_after: None,
            response: None,
        })?;

        let error = QueryError::http(raw.status, raw.status_text.clone(), raw.body.clone());
        if error.is_retryable() {
            let retry_after = raw.headers.get(HEADER_RETRY_AFTER).and_then(parse_retry_after);
            return Err(Attempt { error, retry_after, response: Some(raw) });
        }
        Ok(raw)
    }

    fn build_request(&self, url: &str, init: &RequestInit) -> QueryResult<reqwest::Request> {
        let method = Method::from_bytes(init.method.as_str().as_bytes())
            .map_err(|e| QueryError::InvalidInput(format!("invalid method {}: {e}", init.method)))?;
        let mut builder = self.client.request(method, url).headers(to_header_map(&init.headers)?);
        if let Some(body) = &init.body {
            builder = builder.body(body.clone());
        }
        builder.build().map_err(|err| InfraError::from(err).into())
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(&self, url: &str, init: &RequestInit) -> QueryResult<RawResponse> {
        self.execute(url, init).await
    }
}

async fn read_response(response: reqwest::Response) -> QueryResult<RawResponse> {
    let status = response.status();
    let mut headers = Headers::new();
    for (name, value) in response.headers() {
        if let Ok(value) = value.to_str() {
            headers.set(name.as_str(), value);
        }
    }
    let body = response.text().await.map_err(|err| QueryError::from(InfraError::from(err)))?;
    Ok(RawResponse {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        headers,
        body,
    })
}

fn to_header_map(headers: &Headers) -> QueryResult<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| QueryError::InvalidInput(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            QueryError::InvalidInput(format!("invalid value for header '{name}': {e}"))
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

/// `Retry-After` as delta-seconds or an HTTP date.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    max_attempts: u32,
    base_backoff: Duration,
    jitter: Jitter,
    max_retry_after: Duration,
    user_agent: Option<String>,
    default_headers: Headers,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            jitter: Jitter::Equal,
            max_retry_after: Duration::from_secs(120),
            user_agent: None,
            default_headers: Headers::new(),
        }
    }
}

impl HttpClientBuilder {
    /// Per-attempt timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure the total number of attempts (initial try + retries).
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// First retry delay; doubles on each further retry.
    #[must_use]
    pub const fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    #[must_use]
    pub const fn jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Longest `Retry-After` still waited for; longer ones end the retries.
    #[must_use]
    pub const fn max_retry_after(mut self, limit: Duration) -> Self {
        self.max_retry_after = limit;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Headers added to every request unless the request sets them.
    #[must_use]
    pub fn default_headers(mut self, headers: Headers) -> Self {
        self.default_headers = headers;
        self
    }

    /// # Errors
    ///
    /// Fails when reqwest rejects the settings or a default header cannot be
    /// encoded (`QueryError::InvalidInput`).
    pub fn build(self) -> QueryResult<HttpClient> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout);

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if !self.default_headers.is_empty() {
            builder = builder.default_headers(to_header_map(&self.default_headers)?);
        }

        let client = builder.build().map_err(|err| QueryError::from(InfraError::from(err)))?;

        let retry = RetryConfig::builder()
            .max_attempts(self.max_attempts.max(1))
            .exponential_backoff(self.base_backoff, 2.0, MAX_BACKOFF)
            .jitter(self.jitter)
            .build()
            .map_err(|e| QueryError::Config(e.to_string()))?;

        Ok(HttpClient { client, retry, max_retry_after: self.max_retry_after })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_with_defaults() -> HttpClient {
        HttpClient::builder()
            .base_backoff(Duration::from_millis(10))
            .jitter(Jitter::None)
            .max_attempts(3)
            .build()
            .expect("http client")
    }

    async fn get_with_defaults(server: &MockServer) -> RawResponse {
        client_with_defaults().execute(&server.uri(), &RequestInit::get()).await.unwrap()
    }

    #[tokio::test]
    async fn returns_successful_response_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("ok").insert_header("X-Seen", "yes"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with_defaults();
        let response = client.execute(&server.uri(), &RequestInit::get()).await.expect("response");

        assert_eq!(response.status, 200);
        assert_eq!(response.status_text, "OK");
        assert_eq!(response.body, "ok");
        assert_eq!(response.headers.get("x-seen"), Some("yes"));
    }

    #[tokio::test]
    async fn sends_method_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/items/1"))
            .and(header("IF-Match", "*"))
            .and(body_string("{\"a\":1}"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let init = RequestInit::new(querykit_domain::HttpMethod::Patch)
            .header("IF-Match", "*")
            .body("{\"a\":1}");
        let response = client_with_defaults()
            .execute(&format!("{}/items/1", server.uri()), &init)
            .await
            .expect("response");
        assert_eq!(response.status, 204);
    }

    #[tokio::test]
    async fn retries_throttled_responses_until_success() {
        let server = MockServer::start().await;
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        Mock::given(method("GET"))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                let current = attempts_clone.fetch_add(1, Ordering::SeqCst);
                if current < 2 {
                    ResponseTemplate::new(503)
                } else {
                    ResponseTemplate::new(200)
                }
            })
            .mount(&server)
            .await;

        let response = get_with_defaults(&server).await;
        assert_eq!(response.status, 200);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_last_throttled_response_when_attempts_run_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .expect(3)
            .mount(&server)
            .await;

        let response = get_with_defaults(&server).await;
        assert_eq!(response.status, 429);
        assert_eq!(response.body, "slow down");
    }

    #[tokio::test]
    async fn does_not_retry_plain_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let response = get_with_defaults(&server).await;
        assert_eq!(response.status, 500);
    }

    #[tokio::test]
    async fn retry_after_over_the_limit_stops_retrying() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3600"))
            .expect(1)
            .mount(&server)
            .await;

        let response = get_with_defaults(&server).await;
        assert_eq!(response.status, 429);
    }

    #[tokio::test]
    async fn connection_failures_surface_as_network_errors() {
        let client = HttpClient::builder()
            .max_attempts(2)
            .base_backoff(Duration::from_millis(1))
            .build()
            .unwrap();
        let result = client.execute("http://127.0.0.1:9/", &RequestInit::get()).await;
        assert!(matches!(result, Err(QueryError::Network(_))));
    }

    #[test]
    fn retry_after_accepts_seconds_and_dates() {
        assert_eq!(parse_retry_after(" 7 "), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[test]
    fn invalid_header_names_are_rejected() {
        let headers: Headers = [("bad header", "x")].into_iter().collect();
        assert!(matches!(to_header_map(&headers), Err(QueryError::InvalidInput(_))));
    }
}
