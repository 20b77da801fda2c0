//! A JSON batch envelope for exercising the batch lifecycle

use querykit_core::behaviors::strip_marker_headers;
use querykit_core::{BatchCodec, BatchRequest, BatchSegment};
use querykit_domain::{QueryError, QueryResult, RawResponse, RequestInit};
use serde_json::{json, Value};

/// Encodes `{"batch", "requests": [{id, method, url, headers, body}]}` and
/// decodes `{"responses": [{id, status, body}]}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEnvelopeCodec;

impl BatchCodec for JsonEnvelopeCodec {
    fn endpoint(&self, base_url: &str) -> String {
        format!("{}/$batch", base_url.trim_end_matches('/'))
    }

    fn encode(
        &self,
        batch_id: &str,
        _base_url: &str,
        requests: &[BatchRequest],
    ) -> QueryResult<RequestInit> {
        let encoded: Vec<Value> = requests
            .iter()
            .map(|request| {
                let mut init = request.init.clone();
                strip_marker_headers(&mut init);
                let headers: serde_json::Map<String, Value> =
                    init.headers.iter().map(|(k, v)| (k.to_string(), Value::from(v))).collect();
                json!({
                    "id": request.id,
                    "method": init.method.as_str(),
                    "url": request.url,
                    "headers": headers,
                    "body": init.body,
                })
            })
            .collect();
        RequestInit::post()
            .header("Content-Type", "application/json")
            .json(&json!({ "batch": batch_id, "requests": encoded }))
    }

    fn decode(
        &self,
        response: &RawResponse,
        _requests: &[BatchRequest],
    ) -> QueryResult<Vec<BatchSegment>> {
        let body: Value = serde_json::from_str(&response.body)?;
        let responses = body["responses"]
            .as_array()
            .ok_or_else(|| QueryError::Batch("envelope has no responses".into()))?;
        responses
            .iter()
            .map(|segment| {
                let id = segment["id"]
                    .as_str()
                    .ok_or_else(|| QueryError::Batch("segment without id".into()))?;
                let status = segment["status"]
                    .as_u64()
                    .and_then(|s| u16::try_from(s).ok())
                    .unwrap_or(500);
                Ok(BatchSegment::ok(id, RawResponse::new(status, segment["body"].to_string())))
            })
            .collect()
    }
}

/// Answers an encoded envelope in reverse order.
///
/// `reply(url)` gives the status and body of each sub-request; `None` omits
/// that segment from the response.
pub fn batch_reply(
    init: &RequestInit,
    reply: impl Fn(&str) -> Option<(u16, Value)>,
) -> RawResponse {
    let body = init.body.as_deref().unwrap_or("{}");
    let envelope: Value = serde_json::from_str(body).unwrap_or_default();
    let mut responses: Vec<Value> = envelope["requests"]
        .as_array()
        .map(|requests| {
            requests
                .iter()
                .filter_map(|request| {
                    let url = request["url"].as_str().unwrap_or_default();
                    reply(url).map(|(status, body)| {
                        json!({ "id": request["id"], "status": status, "body": body })
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    responses.reverse();
    RawResponse::new(200, json!({ "responses": responses }).to_string())
}
