//! Forwards the `log` moment into `tracing`

use querykit_domain::{LogEntry, LogLevel};

use crate::queryable::Queryable;
use crate::timeline::Behavior;

/// Emits `log` entries at or above `min_level` as tracing events.
#[derive(Debug, Clone, Copy)]
pub struct TracingLog {
    min_level: LogLevel,
}

impl Default for TracingLog {
    fn default() -> Self {
        Self::new(LogLevel::Warning)
    }
}

impl TracingLog {
    pub const fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }
}

fn forward(entry: &LogEntry) {
    let timestamp = entry.timestamp.to_rfc3339();
    match entry.level {
        LogLevel::Verbose => tracing::debug!(target: "querykit", %timestamp, "{}", entry.message),
        LogLevel::Info => tracing::info!(target: "querykit", %timestamp, "{}", entry.message),
        LogLevel::Warning => tracing::warn!(target: "querykit", %timestamp, "{}", entry.message),
        LogLevel::Error => tracing::error!(target: "querykit", %timestamp, "{}", entry.message),
    }
}

impl Behavior<Queryable> for TracingLog {
    fn apply(self, target: Queryable) -> Queryable {
        let min_level = self.min_level;
        target.on_log(move |entry| {
            if entry.level >= min_level {
                forward(entry);
            }
        })
    }
}
