//! Graph API `$batch` over JSON
//!
//! Requests go out as `{"requests":[{id,method,url,headers,body}]}` with URLs
//! relative to the version root (`https://host/v1.0`). Responses may come back
//! in any order and are matched by id.

use querykit_core::behaviors::strip_marker_headers;
use querykit_core::{BatchCodec, BatchRequest, BatchSegment};
use querykit_domain::constants::HEADER_CONTENT_TYPE;
use querykit_domain::{Headers, QueryError, QueryResult, RawResponse, RequestInit};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Most requests the graph endpoint accepts in one batch.
pub const GRAPH_BATCH_LIMIT: usize = 20;

/// Codec for the graph API's JSON `$batch` endpoint.
#[derive(Debug, Clone, Copy)]
pub struct JsonBatchCodec {
    limit: Option<usize>,
}

impl Default for JsonBatchCodec {
    fn default() -> Self {
        Self { limit: Some(GRAPH_BATCH_LIMIT) }
    }
}

impl JsonBatchCodec {
    /// A codec that sends batches of any size.
    pub const fn unlimited() -> Self {
        Self { limit: None }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    requests: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    id: &'a str,
    method: &'static str,
    url: String,
    #[serde(skip_serializing_if = "Headers::is_empty")]
    headers: Headers,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<Value>,
}

#[derive(Deserialize)]
struct ReplyEnvelope {
    #[serde(default)]
    responses: Vec<Reply>,
}

#[derive(Deserialize)]
struct Reply {
    id: String,
    status: u16,
    #[serde(default)]
    headers: Headers,
    #[serde(default)]
    body: Option<Value>,
}

/// `scheme://host/<first path segment>` of `url`.
pub fn version_root(url: &str) -> QueryResult<String> {
    let parsed = url::Url::parse(url)
        .map_err(|e| QueryError::InvalidInput(format!("invalid graph url '{url}': {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| QueryError::InvalidInput(format!("graph url '{url}' has no host")))?;
    let authority = match parsed.port() {
        Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
        None => format!("{}://{host}", parsed.scheme()),
    };
    match parsed.path_segments().and_then(|mut segments| segments.find(|s| !s.is_empty())) {
        Some(version) => Ok(format!("{authority}/{version}")),
        None => Ok(authority),
    }
}

fn relative_to(root: &str, url: &str) -> String {
    let rest = url.strip_prefix(root).unwrap_or(url);
    if rest.starts_with('/') {
        rest.to_string()
    } else {
        format!("/{rest}")
    }
}

fn body_value(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

impl BatchCodec for JsonBatchCodec {
    fn endpoint(&self, base_url: &str) -> String {
        let root = version_root(base_url)
            .unwrap_or_else(|_| base_url.trim_end_matches('/').to_string());
        format!("{root}/$batch")
    }

    fn encode(
        &self,
        _batch_id: &str,
        base_url: &str,
        requests: &[BatchRequest],
    ) -> QueryResult<RequestInit> {
        if let Some(limit) = self.limit {
            if requests.len() > limit {
                return Err(QueryError::Batch(format!(
                    "graph batches hold at most {limit} requests, got {}",
                    requests.len()
                )));
            }
        }
        let root = version_root(base_url)?;
        let parts = requests
            .iter()
            .map(|request| {
                let mut init = request.init.clone();
                strip_marker_headers(&mut init);
                let body = init.body.as_deref().map(body_value);
                if body.is_some() {
                    init.headers.set_if_absent(HEADER_CONTENT_TYPE, "application/json");
                }
                Part {
                    id: &request.id,
                    method: init.method.as_str(),
                    url: relative_to(&root, &request.url),
                    headers: init.headers,
                    body,
                }
            })
            .collect();

        RequestInit::post()
            .header(HEADER_CONTENT_TYPE, "application/json")
            .json(&Envelope { requests: parts })
    }

    fn decode(
        &self,
        response: &RawResponse,
        _requests: &[BatchRequest],
    ) -> QueryResult<Vec<BatchSegment>> {
        let envelope: ReplyEnvelope = serde_json::from_str(&response.body)
            .map_err(|e| QueryError::Batch(format!("malformed batch response: {e}")))?;
        Ok(envelope
            .responses
            .into_iter()
            .map(|reply| {
                let body = match reply.body {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(text)) => text,
                    Some(other) => other.to_string(),
                };
                BatchSegment::ok(
                    reply.id,
                    RawResponse {
                        status: reply.status,
                        status_text: String::new(),
                        headers: reply.headers,
                        body,
                    },
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use querykit_domain::HttpMethod;
    use serde_json::json;

    use super::*;

    fn request(id: &str, init: RequestInit, url: &str) -> BatchRequest {
        BatchRequest { id: id.into(), url: url.into(), init }
    }

    #[test]
    fn version_root_keeps_the_first_segment() {
        let root = |url: &str| version_root(url).unwrap();
        assert_eq!(root("https://graph.example/v1.0/me/drive"), "https://graph.example/v1.0");
        assert_eq!(root("http://localhost:9000/beta"), "http://localhost:9000/beta");
        assert!(version_root("not a url").is_err());
        assert_eq!(
            JsonBatchCodec::default().endpoint("https://graph.example/v1.0/me"),
            "https://graph.example/v1.0/$batch"
        );
    }

    #[test]
    fn encodes_relative_urls_and_json_bodies() {
        let requests = [
            request(
                "1",
                RequestInit::get().header("X-QueryKit-CacheNever", "1"),
                "https://graph.example/v1.0/me",
            ),
            request(
                "2",
                RequestInit::new(HttpMethod::Patch).body(r#"{"displayName":"x"}"#),
                "https://graph.example/v1.0/groups/g1",
            ),
        ];
        let init =
            JsonBatchCodec::default().encode("b", "https://graph.example/v1.0", &requests).unwrap();
        let sent: Value = serde_json::from_str(init.body.as_deref().unwrap()).unwrap();

        assert_eq!(init.method, HttpMethod::Post);
        assert_eq!(
            sent,
            json!({"requests": [
                {"id": "1", "method": "GET", "url": "/me"},
                {"id": "2", "method": "PATCH", "url": "/groups/g1",
                 "headers": {"Content-Type": "application/json"},
                 "body": {"displayName": "x"}}
            ]})
        );
    }

    #[test]
    fn rejects_batches_over_the_limit() {
        const ROOT: &str = "https://graph.example/v1.0";
        let requests: Vec<_> = (1..=21)
            .map(|i| request(&i.to_string(), RequestInit::get(), "https://graph.example/v1.0/me"))
            .collect();
        assert!(matches!(
            JsonBatchCodec::default().encode("b", ROOT, &requests),
            Err(QueryError::Batch(_))
        ));
        assert!(JsonBatchCodec::unlimited().encode("b", ROOT, &requests).is_ok());
    }

    #[test]
    fn decodes_out_of_order_responses() {
        let body = json!({"responses": [
            {"id": "2", "status": 404, "body": {"error": {"code": "NotFound"}}},
            {"id": "1", "status": 200,
             "headers": {"Content-Type": "application/json"},
             "body": {"id": "me"}},
            {"id": "3", "status": 204}
        ]});
        let response = RawResponse::new(200, body.to_string());
        let segments = JsonBatchCodec::default().decode(&response, &[]).unwrap();

        let by_id = |id: &str| {
            let segment = segments.iter().find(|s| s.id == id).unwrap();
            segment.result.as_ref().unwrap().clone()
        };
        assert_eq!(by_id("1").status, 200);
        assert_eq!(by_id("1").json::<Value>().unwrap(), json!({"id": "me"}));
        assert_eq!(by_id("1").headers.get("content-type"), Some("application/json"));
        assert_eq!(by_id("2").status, 404);
        assert_eq!(by_id("3").body, "");
    }

    #[test]
    fn malformed_response_fails_the_batch() {
        assert!(matches!(
            JsonBatchCodec::default().decode(&RawResponse::new(200, "<html>"), &[]),
            Err(QueryError::Batch(_))
        ));
    }
}
