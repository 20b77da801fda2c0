//! Raw transport response

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::headers::Headers;
use crate::errors::QueryResult;

/// What a `send` observer hands to `parse`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResponse {
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, status_text: String::new(), headers: Headers::new(), body: body.into() }
    }

    #[must_use]
    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// `true` for any 2xx status.
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// `QueryError::Parse` when the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> QueryResult<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}
