//! Request digests from the document API's `contextinfo` endpoint

use std::time::Duration;

use async_trait::async_trait;
use querykit_core::{Digest, DigestSource, Queryable};
use querykit_domain::constants::HEADER_ACCEPT;
use querykit_domain::{QueryError, QueryResult, RequestInit};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Lifetime assumed when the server omits `FormDigestTimeoutSeconds`.
const DEFAULT_DIGEST_TIMEOUT_SECS: u64 = 1800;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContextInfo {
    form_digest_value: String,
    #[serde(default)]
    form_digest_timeout_seconds: Option<u64>,
}

/// Posts to `{web}/_api/contextinfo` through a base queryable's observers.
///
/// The base supplies transport, headers and auth; the digest behavior skips
/// `contextinfo` itself so the lookup never recurses.
#[derive(Debug, Clone)]
pub struct ContextInfoDigestSource {
    base: Queryable,
}

impl ContextInfoDigestSource {
    /// `base` is usually the root the digest behavior is applied to.
    pub const fn new(base: Queryable) -> Self {
        Self { base }
    }
}

/// Reads the digest from either the minimal-metadata or the verbose payload.
pub fn parse_context_info(value: Value) -> QueryResult<Digest> {
    let payload = match value {
        Value::Object(mut map) if map.contains_key("GetContextWebInformation") => {
            map.remove("GetContextWebInformation").unwrap_or(Value::Null)
        }
        other => other,
    };
    let info: ContextInfo = serde_json::from_value(payload)
        .map_err(|e| QueryError::Auth(format!("unexpected contextinfo payload: {e}")))?;
    let timeout_secs = info.form_digest_timeout_seconds.unwrap_or(DEFAULT_DIGEST_TIMEOUT_SECS);
    Ok(Digest { value: info.form_digest_value, expires_in: Duration::from_secs(timeout_secs) })
}

#[async_trait]
impl DigestSource for ContextInfoDigestSource {
    async fn acquire(&self, web_url: &str) -> QueryResult<Digest> {
        let url = format!("{}/_api/contextinfo", web_url.trim_end_matches('/'));
        debug!(%url, "requesting form digest");
        let init = RequestInit::post().header(HEADER_ACCEPT, "application/json;odata=nometadata");
        let value = Queryable::with_base(&self.base, url).invoke_with(init).await?;
        parse_context_info(value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn reads_minimal_metadata_payload() {
        let digest = parse_context_info(json!({
            "FormDigestValue": "0x1,01 Jan",
            "FormDigestTimeoutSeconds": 900,
            "WebFullUrl": "https://x.example/sites/dev"
        }))
        .unwrap();
        assert_eq!(digest.value, "0x1,01 Jan");
        assert_eq!(digest.expires_in, Duration::from_secs(900));
    }

    #[test]
    fn reads_verbose_payload_after_envelope_unwrap() {
        let digest = parse_context_info(json!({
            "GetContextWebInformation": { "FormDigestValue": "0x2" }
        }))
        .unwrap();
        assert_eq!(digest.value, "0x2");
        assert_eq!(digest.expires_in, Duration::from_secs(DEFAULT_DIGEST_TIMEOUT_SECS));
    }

    #[test]
    fn missing_digest_is_an_auth_error() {
        assert!(matches!(parse_context_info(json!({"Other": 1})), Err(QueryError::Auth(_))));
    }
}
