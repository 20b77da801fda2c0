//! Conversions from external infrastructure errors into domain errors.

use querykit_domain::QueryError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub QueryError);

impl From<InfraError> for QueryError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<QueryError> for InfraError {
    fn from(value: QueryError) -> Self {
        Self(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoQueryError {
    fn into_query_error(self) -> QueryError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → QueryError */
/* -------------------------------------------------------------------------- */

impl IntoQueryError for HttpError {
    fn into_query_error(self) -> QueryError {
        if self.is_timeout() {
            return QueryError::Timeout(format!("HTTP request timed out: {self}"));
        }

        if self.is_builder() {
            return QueryError::InvalidInput(format!("invalid HTTP request: {self}"));
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return QueryError::Network(format!("HTTP connection failure: {self}"));
        }

        if let Some(status) = self.status() {
            return QueryError::http(
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown status"),
                "",
            );
        }

        QueryError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        Self(value.into_query_error())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → QueryError */
/* -------------------------------------------------------------------------- */

impl IntoQueryError for std::io::Error {
    fn into_query_error(self) -> QueryError {
        QueryError::Cache(format!("{:?}: {self}", self.kind()))
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        Self(value.into_query_error())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::Client;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn timeouts_map_to_timeout_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = Client::builder().timeout(Duration::from_millis(50)).build().unwrap();
        let err = client.get(server.uri()).send().await.unwrap_err();
        let mapped: QueryError = InfraError::from(err).into();
        assert!(matches!(mapped, QueryError::Timeout(_)));
        assert!(mapped.is_retryable());
    }

    #[tokio::test]
    async fn refused_connections_map_to_network_errors() {
        let client = Client::builder().no_proxy().build().unwrap();
        let err = client.get("http://127.0.0.1:9").send().await.unwrap_err();
        let mapped: QueryError = InfraError::from(err).into();
        assert!(matches!(mapped, QueryError::Network(_)));
    }

    #[tokio::test]
    async fn status_errors_keep_the_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

        let response = Client::new().get(server.uri()).send().await.unwrap();
        let err = response.error_for_status().unwrap_err();
        let mapped: QueryError = InfraError::from(err).into();
        assert_eq!(mapped.status(), Some(404));
    }

    #[test]
    fn io_errors_map_to_cache_errors() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let mapped: QueryError = InfraError::from(err).into();
        assert!(matches!(
            mapped,
            QueryError::Cache(message) if message.contains("PermissionDenied")
        ));
    }
}
