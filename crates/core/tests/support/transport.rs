//! In-memory transport with scripted responses

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use querykit_core::Transport;
use querykit_domain::{QueryResult, RawResponse, RequestInit};
use serde_json::{json, Value};

type Responder = dyn Fn(&str, &RequestInit, usize) -> QueryResult<RawResponse> + Send + Sync;

/// Records every call and answers with a scripted responder.
///
/// The responder also receives the 1-based call number.
#[derive(Clone)]
pub struct ScriptedTransport {
    calls: Arc<Mutex<Vec<(String, RequestInit)>>>,
    respond: Arc<Responder>,
}

impl ScriptedTransport {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&str, &RequestInit, usize) -> QueryResult<RawResponse> + Send + Sync + 'static,
    {
        Self { calls: Arc::new(Mutex::new(Vec::new())), respond: Arc::new(respond) }
    }

    /// Always `200` with `body`.
    pub fn json(body: Value) -> Self {
        let text = body.to_string();
        Self::new(move |_, _, _| Ok(RawResponse::new(200, text.clone())))
    }

    /// `200` with `{"url": <request url>, "call": <call number>}`.
    pub fn echo() -> Self {
        Self::new(|url, _, call| {
            Ok(RawResponse::new(200, json!({ "url": url, "call": call }).to_string()))
        })
    }

    pub fn calls(&self) -> Vec<(String, RequestInit)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn last_init(&self) -> Option<RequestInit> {
        self.calls.lock().last().map(|(_, init)| init.clone())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, url: &str, init: &RequestInit) -> QueryResult<RawResponse> {
        let call = {
            let mut calls = self.calls.lock();
            calls.push((url.to_string(), init.clone()));
            calls.len()
        };
        (self.respond)(url, init, call)
    }
}
