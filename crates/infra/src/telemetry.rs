//! Tracing subscriber setup for binaries and tests

use querykit_domain::LogLevel;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable read for the filter directive.
pub const LOG_ENV: &str = "QUERYKIT_LOG";

/// Tracing filter directive matching a `log` moment level.
pub const fn filter_for(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Verbose => "debug",
        LogLevel::Info => "info",
        LogLevel::Warning => "warn",
        LogLevel::Error => "error",
    }
}

/// Installs a global fmt subscriber writing to stderr.
///
/// `QUERYKIT_LOG` wins over `default_filter`. Returns `false` when a global
/// subscriber was already installed.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_map_to_directives() {
        assert_eq!(filter_for(LogLevel::Verbose), "debug");
        assert_eq!(filter_for(LogLevel::Warning), "warn");
    }

    #[test]
    fn second_init_reports_existing_subscriber() {
        let _ = init_tracing("info");
        assert!(!init_tracing("debug"));
    }
}
