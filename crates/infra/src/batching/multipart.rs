//! Document API `$batch` over `multipart/mixed`
//!
//! Each `GET` is its own batch part; every other method is wrapped in a
//! single-request changeset. `PATCH`, `PUT` and `DELETE` are tunnelled through
//! `POST` with an `X-HTTP-Method` override. Sub-request URLs are absolute.
//!
//! Responses are matched by position: the n-th `--batchresponse_` part answers
//! the n-th request.

use once_cell::sync::Lazy;
use querykit_core::auth::web_url_of;
use querykit_core::behaviors::strip_marker_headers;
use querykit_core::{BatchCodec, BatchRequest, BatchSegment};
use querykit_domain::constants::{HEADER_ACCEPT, HEADER_CONTENT_TYPE};
use querykit_domain::{Headers, HttpMethod, QueryError, QueryResult, RawResponse, RequestInit};
use regex::Regex;
use uuid::Uuid;

#[allow(clippy::unwrap_used)]
static STATUS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^HTTP/[0-9.]+\s+([0-9]{3})\s*(.*)$").unwrap());

const CRLF: &str = "\r\n";
const DEFAULT_ACCEPT: &str = "application/json;odata=nometadata";
const DEFAULT_CONTENT_TYPE: &str = "application/json;charset=utf-8";

/// Codec for the document API's multipart `$batch` endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultipartBatchCodec;

fn method_override(method: HttpMethod) -> Option<&'static str> {
    match method {
        HttpMethod::Patch => Some("MERGE"),
        HttpMethod::Put => Some("PUT"),
        HttpMethod::Delete => Some("DELETE"),
        _ => None,
    }
}

fn absolute_url(web_url: &str, url: &str) -> String {
    if url.contains("://") {
        url.to_string()
    } else {
        format!("{}/{}", web_url.trim_end_matches('/'), url.trim_start_matches('/'))
    }
}

fn write_request(out: &mut String, web_url: &str, request: &BatchRequest) {
    let mut init = request.init.clone();
    strip_marker_headers(&mut init);
    let url = absolute_url(web_url, &request.url);

    out.push_str("Content-Type: application/http");
    out.push_str(CRLF);
    out.push_str("Content-Transfer-Encoding: binary");
    out.push_str(CRLF);
    out.push_str(CRLF);

    let mut headers = init.headers.clone();
    match method_override(init.method) {
        Some(tunnelled) => {
            out.push_str(&format!("POST {url} HTTP/1.1{CRLF}"));
            headers.set("X-HTTP-Method", tunnelled);
            if tunnelled != "PUT" {
                headers.set_if_absent("IF-Match", "*");
            }
        }
        None => out.push_str(&format!("{} {url} HTTP/1.1{CRLF}", init.method)),
    }
    headers.set_if_absent(HEADER_ACCEPT, DEFAULT_ACCEPT);
    if init.method != HttpMethod::Get {
        headers.set_if_absent(HEADER_CONTENT_TYPE, DEFAULT_CONTENT_TYPE);
    }
    for (name, value) in headers.iter() {
        out.push_str(&format!("{name}: {value}{CRLF}"));
    }
    out.push_str(CRLF);
    if let Some(body) = &init.body {
        out.push_str(body);
        out.push_str(CRLF);
    }
}

impl BatchCodec for MultipartBatchCodec {
    fn endpoint(&self, base_url: &str) -> String {
        format!("{}/_api/$batch", web_url_of(base_url))
    }

    fn encode(
        &self,
        batch_id: &str,
        base_url: &str,
        requests: &[BatchRequest],
    ) -> QueryResult<RequestInit> {
        let web_url = web_url_of(base_url);
        let boundary = format!("batch_{batch_id}");
        let mut body = String::new();

        for request in requests {
            body.push_str(&format!("--{boundary}{CRLF}"));
            if request.init.method == HttpMethod::Get {
                write_request(&mut body, &web_url, request);
            } else {
                let changeset = format!("changeset_{}", Uuid::new_v4());
                body.push_str(&format!(
                    "Content-Type: multipart/mixed; boundary=\"{changeset}\"{CRLF}{CRLF}"
                ));
                body.push_str(&format!("--{changeset}{CRLF}"));
                write_request(&mut body, &web_url, request);
                body.push_str(&format!("--{changeset}--{CRLF}{CRLF}"));
            }
        }
        body.push_str(&format!("--{boundary}--{CRLF}"));

        Ok(RequestInit::post()
            .header(HEADER_CONTENT_TYPE, format!("multipart/mixed; boundary=\"{boundary}\""))
            .body(body))
    }

    fn decode(
        &self,
        response: &RawResponse,
        requests: &[BatchRequest],
    ) -> QueryResult<Vec<BatchSegment>> {
        let parts = split_parts(&response.body);
        if parts.len() != requests.len() {
            return Err(QueryError::Batch(format!(
                "batch response has {} parts for {} requests",
                parts.len(),
                requests.len()
            )));
        }
        Ok(requests
            .iter()
            .zip(parts)
            .map(|(request, part)| BatchSegment {
                id: request.id.clone(),
                result: parse_part(&part),
            })
            .collect())
    }
}

/// Lines of every `--batchresponse_` part, closing delimiter and preamble dropped.
fn split_parts(body: &str) -> Vec<Vec<&str>> {
    let mut parts = Vec::new();
    let mut current: Option<Vec<&str>> = None;
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--batchresponse_") {
            if let Some(part) = current.take() {
                parts.push(part);
            }
            if !trimmed.ends_with("--") {
                current = Some(Vec::new());
            }
            continue;
        }
        if let Some(part) = current.as_mut() {
            part.push(line);
        }
    }
    if let Some(part) = current {
        parts.push(part);
    }
    parts
}

fn parse_part(lines: &[&str]) -> QueryResult<RawResponse> {
    let lines: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|line| !line.trim().starts_with("--changesetresponse_"))
        .collect();

    let (index, captures) = lines
        .iter()
        .enumerate()
        .find_map(|(i, line)| STATUS_LINE.captures(line.trim()).map(|c| (i, c)))
        .ok_or_else(|| QueryError::Batch("batch part has no status line".into()))?;
    let status: u16 = captures[1]
        .parse()
        .map_err(|_| QueryError::Batch(format!("invalid status in '{}'", lines[index])))?;
    let status_text = captures.get(2).map_or("", |m| m.as_str()).trim().to_string();

    let mut headers = Headers::new();
    let mut rest = lines[index + 1..].iter();
    for line in rest.by_ref() {
        if line.trim().is_empty() {
            break;
        }
        match line.split_once(':') {
            Some((name, value)) => headers.set(name.trim(), value.trim()),
            None => return Err(QueryError::Batch(format!("malformed header line '{line}'"))),
        }
    }
    let body = rest.copied().collect::<Vec<_>>().join("\n").trim().to_string();

    Ok(RawResponse { status, status_text, headers, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str, init: RequestInit, url: &str) -> BatchRequest {
        BatchRequest { id: id.into(), url: url.into(), init }
    }

    #[test]
    fn endpoint_sits_on_the_web() {
        let codec = MultipartBatchCodec;
        let expected = "https://x.example/sites/dev/_api/$batch";
        assert_eq!(codec.endpoint("https://x.example/sites/dev/_api/web"), expected);
        assert_eq!(codec.endpoint("https://x.example/sites/dev"), expected);
        assert_eq!(codec.endpoint("https://x.example/sites/dev/_api"), expected);
    }

    #[test]
    fn gets_are_parts_and_writes_are_changesets() {
        let requests = [
            request("1", RequestInit::get(), "https://x.example/_api/web"),
            request(
                "2",
                RequestInit::new(HttpMethod::Patch)
                    .header("X-QueryKit-BatchNever", "1")
                    .body("{\"Title\":\"a\"}"),
                "https://x.example/_api/web/lists(1)",
            ),
        ];
        let init = MultipartBatchCodec.encode("b1", "https://x.example/_api", &requests).unwrap();
        let body = init.body.unwrap();

        let content_type = init.headers.get("content-type");
        assert_eq!(content_type, Some("multipart/mixed; boundary=\"batch_b1\""));
        assert!(body.starts_with("--batch_b1\r\nContent-Type: application/http\r\n"));
        assert!(body.contains("GET https://x.example/_api/web HTTP/1.1\r\n"));
        assert!(body.contains("Content-Type: multipart/mixed; boundary=\"changeset_"));
        assert!(body.contains("POST https://x.example/_api/web/lists(1) HTTP/1.1\r\n"));
        assert!(body.contains("X-HTTP-Method: MERGE\r\n"));
        assert!(body.contains("IF-Match: *\r\n"));
        assert!(body.contains("{\"Title\":\"a\"}\r\n"));
        assert!(!body.contains("X-QueryKit"));
        assert!(body.ends_with("--batch_b1--\r\n"));
    }

    #[test]
    fn relative_urls_are_resolved_against_the_web() {
        let requests = [request("1", RequestInit::get(), "_api/web/title")];
        let init = MultipartBatchCodec.encode("b", "https://x.example/sites/a/_api", &requests);
        let body = init.unwrap().body.unwrap();
        assert!(body.contains("GET https://x.example/sites/a/_api/web/title HTTP/1.1"));
    }

    const RESPONSE: &str = "--batchresponse_1\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
\r\n\
HTTP/1.1 200 OK\r\n\
CONTENT-TYPE: application/json;odata=nometadata\r\n\
\r\n\
{\"Title\":\"Dev\"}\r\n\
--batchresponse_1\r\n\
Content-Type: multipart/mixed; boundary=changesetresponse_9\r\n\
\r\n\
--changesetresponse_9\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
\r\n\
HTTP/1.1 204 No Content\r\n\
\r\n\
--changesetresponse_9--\r\n\
--batchresponse_1\r\n\
Content-Type: application/http\r\n\
\r\n\
garbage\r\n\
--batchresponse_1--\r\n";

    #[test]
    fn decodes_parts_in_order_with_isolated_failures() {
        let requests = [
            request("1", RequestInit::get(), "u1"),
            request("2", RequestInit::post(), "u2"),
            request("3", RequestInit::get(), "u3"),
        ];
        let response = RawResponse::new(200, RESPONSE);
        let segments = MultipartBatchCodec.decode(&response, &requests).unwrap();

        assert_eq!(segments.len(), 3);
        let first = segments[0].result.as_ref().unwrap();
        assert_eq!(first.status, 200);
        assert_eq!(first.body, "{\"Title\":\"Dev\"}");
        assert_eq!(first.headers.get("content-type"), Some("application/json;odata=nometadata"));

        let second = segments[1].result.as_ref().unwrap();
        assert_eq!(second.status, 204);
        assert_eq!(second.status_text, "No Content");
        assert_eq!(second.body, "");

        assert!(matches!(segments[2].result, Err(QueryError::Batch(_))));
        assert_eq!(segments[2].id, "3");
    }

    #[test]
    fn part_count_mismatch_fails_the_batch() {
        let requests = [request("1", RequestInit::get(), "u1")];
        assert!(matches!(
            MultipartBatchCodec.decode(&RawResponse::new(200, RESPONSE), &requests),
            Err(QueryError::Batch(_))
        ));
    }
}
