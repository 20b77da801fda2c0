//! Shared test helpers for `querykit-core` integration tests.
//!
//! A scripted in-memory transport, a JSON batch codec and a log recorder, so
//! pipeline tests can focus on behaviour instead of wiring.
#![allow(dead_code)]

pub mod codec;
pub mod transport;

use std::sync::Arc;

use parking_lot::Mutex;
use querykit_core::Queryable;
use querykit_domain::LogEntry;

#[allow(unused_imports)]
pub use codec::{batch_reply, JsonEnvelopeCodec};
#[allow(unused_imports)]
pub use transport::ScriptedTransport;

/// Collects entries emitted through the `log` moment.
#[derive(Clone, Default)]
pub struct LogRecorder {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl LogRecorder {
    pub fn attach(&self, target: Queryable) -> Queryable {
        let entries = Arc::clone(&self.entries);
        target.on_log(move |entry| entries.lock().push(entry.clone()))
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries.lock().iter().map(|e| e.message.clone()).collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries.lock().iter().any(|e| e.message.contains(needle))
    }
}

/// Shared append-only list for recording observer side effects.
#[derive(Clone, Default)]
pub struct Trail {
    items: Arc<Mutex<Vec<String>>>,
}

impl Trail {
    pub fn push(&self, item: impl Into<String>) {
        self.items.lock().push(item.into());
    }

    pub fn items(&self) -> Vec<String> {
        self.items.lock().clone()
    }
}
