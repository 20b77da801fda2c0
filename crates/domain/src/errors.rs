//! Error types used throughout QueryKit

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for QueryKit
///
/// Every execution settles with either a value or one of these. The core never
/// translates an observer's error into a different variant.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum QueryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// A response with a non-success status, carrying the response itself.
    #[error("Error making HttpClient request in queryable [{status}] {status_text}")]
    Http { status: u16, status_text: String, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Batch error: {0}")]
    Batch(String),

    #[error("Batch already executed: {0}")]
    BatchClosed(String),

    #[error("Request is already bound to batch {0}")]
    AlreadyBatched(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueryError {
    /// Builds an [`QueryError::Http`] from the pieces of a failed response.
    pub fn http(status: u16, status_text: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Http { status, status_text: status_text.into(), body: body.into() }
    }

    /// Transient failures a retry behavior may repeat.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Http { status, .. } => matches!(status, 429 | 503 | 504),
            _ => false,
        }
    }

    /// HTTP status of an [`QueryError::Http`] failure.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short stable label, used as a structured logging field.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::Http { .. } => "http",
            Self::Parse(_) => "parse",
            Self::Auth(_) => "auth",
            Self::Batch(_) => "batch",
            Self::BatchClosed(_) => "batch_closed",
            Self::AlreadyBatched(_) => "already_batched",
            Self::Cache(_) => "cache",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type alias for QueryKit operations
pub type QueryResult<T> = std::result::Result<T, QueryError>;
