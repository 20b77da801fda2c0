//! Configuration loader
//!
//! Loads a [`ClientConfig`] from environment variables or a file.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file into the environment when one exists
//! 2. Attempts to load from environment variables
//! 3. If `QUERYKIT_BASE_URL` is missing, falls back to a config file
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `QUERYKIT_BASE_URL`: Absolute site or API root (required)
//! - `QUERYKIT_API`: `document` or `graph`
//! - `QUERYKIT_TIMEOUT_MS`: Per-request timeout in milliseconds
//! - `QUERYKIT_RETRY_ATTEMPTS`: Attempts per request, including the first
//! - `QUERYKIT_RETRY_BACKOFF_MS`: Base backoff between attempts
//! - `QUERYKIT_CACHE_ENABLED`: Whether presets attach caching (true/false)
//! - `QUERYKIT_CACHE_TTL_SECS`: Cache entry lifetime in seconds
//! - `QUERYKIT_CLIENT_TAG`: Value for the client tag telemetry header
//! - `QUERYKIT_LOG_LEVEL`: Minimum level forwarded from the `log` moment
//!
//! ## File Locations
//! The loader probes `querykit.toml` then `querykit.json` in the current
//! directory, its parent, and next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use querykit_domain::{ApiKind, ClientConfig, LogLevel, QueryError, QueryResult};

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `QueryError::Config` if neither source yields a valid configuration.
pub fn load() -> QueryResult<ClientConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `QUERYKIT_BASE_URL` is required; everything else keeps its default.
///
/// # Errors
/// Returns `QueryError::Config` if the base URL is missing or a value is invalid.
pub fn load_from_env() -> QueryResult<ClientConfig> {
    let mut config =
        ClientConfig { base_url: env_var("QUERYKIT_BASE_URL")?, ..ClientConfig::default() };

    if let Some(api) = env_opt("QUERYKIT_API") {
        config.api = ApiKind::from_str(&api)?;
    }
    if let Some(timeout) = env_parse::<u64>("QUERYKIT_TIMEOUT_MS")? {
        config.timeout_ms = timeout;
    }
    if let Some(attempts) = env_parse::<u32>("QUERYKIT_RETRY_ATTEMPTS")? {
        config.retry.max_attempts = attempts;
    }
    if let Some(backoff) = env_parse::<u64>("QUERYKIT_RETRY_BACKOFF_MS")? {
        config.retry.base_backoff_ms = backoff;
    }
    config.cache.enabled = env_bool("QUERYKIT_CACHE_ENABLED", config.cache.enabled);
    if let Some(ttl) = env_parse::<u64>("QUERYKIT_CACHE_TTL_SECS")? {
        config.cache.expire_after_secs = ttl;
    }
    config.client_tag = env_opt("QUERYKIT_CLIENT_TAG");
    if let Some(level) = env_opt("QUERYKIT_LOG_LEVEL") {
        config.log_level = LogLevel::from_str(&level)?;
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations with
/// [`probe_config_paths`].
///
/// # Errors
/// Returns `QueryError::Config` if the file is missing, malformed or invalid.
pub fn load_from_file(path: Option<PathBuf>) -> QueryResult<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(QueryError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            QueryError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| QueryError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse and validate configuration; format follows the file extension.
fn parse_config(contents: &str, path: &Path) -> QueryResult<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    let config: ClientConfig = match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| QueryError::Config(format!("Invalid TOML format: {e}")))?,
        "json" => serde_json::from_str(contents)
            .map_err(|e| QueryError::Config(format!("Invalid JSON format: {e}")))?,
        _ => return Err(QueryError::Config(format!("Unsupported config format: {extension}"))),
    };
    config.validate()?;
    Ok(config)
}

/// First existing `querykit.{toml,json}` in the standard locations.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.join(".."));
        dirs.insert(0, cwd);
    }
    let exe_dir = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf));
    if let Some(exe_dir) = exe_dir {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| [dir.join("querykit.toml"), dir.join("querykit.json")])
        .find(|path| path.exists())
}

fn env_var(key: &str) -> QueryResult<String> {
    std::env::var(key)
        .map_err(|_| QueryError::Config(format!("Missing required environment variable: {key}")))
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> QueryResult<Option<T>>
where
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| QueryError::Config(format!("Invalid {key}: {e}")))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map_or(default, |s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use querykit_domain::CacheStoreKind;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const KEYS: [&str; 9] = [
        "QUERYKIT_BASE_URL",
        "QUERYKIT_API",
        "QUERYKIT_TIMEOUT_MS",
        "QUERYKIT_RETRY_ATTEMPTS",
        "QUERYKIT_RETRY_BACKOFF_MS",
        "QUERYKIT_CACHE_ENABLED",
        "QUERYKIT_CACHE_TTL_SECS",
        "QUERYKIT_CLIENT_TAG",
        "QUERYKIT_LOG_LEVEL",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        let truthy = [
            ("QK_BOOL_1", "1"),
            ("QK_BOOL_TRUE", "TRUE"),
            ("QK_BOOL_YES", "yes"),
            ("QK_BOOL_ON", "on"),
        ];
        for (key, value) in truthy {
            std::env::set_var(key, value);
            assert!(env_bool(key, false), "{value} should be true");
            std::env::remove_var(key);
        }
        let falsy = [("QK_BOOL_0", "0"), ("QK_BOOL_FALSE", "false"), ("QK_BOOL_OFF", "off")];
        for (key, value) in falsy {
            std::env::set_var(key, value);
            assert!(!env_bool(key, true), "{value} should be false");
            std::env::remove_var(key);
        }

        std::env::remove_var("QK_BOOL_MISSING");
        assert!(env_bool("QK_BOOL_MISSING", true));
        assert!(!env_bool("QK_BOOL_MISSING", false));
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("QUERYKIT_BASE_URL", "https://graph.example/v1.0");
        std::env::set_var("QUERYKIT_API", "graph");
        std::env::set_var("QUERYKIT_TIMEOUT_MS", "5000");
        std::env::set_var("QUERYKIT_RETRY_ATTEMPTS", "5");
        std::env::set_var("QUERYKIT_RETRY_BACKOFF_MS", "50");
        std::env::set_var("QUERYKIT_CACHE_ENABLED", "yes");
        std::env::set_var("QUERYKIT_CACHE_TTL_SECS", "60");
        std::env::set_var("QUERYKIT_CLIENT_TAG", "reports");
        std::env::set_var("QUERYKIT_LOG_LEVEL", "verbose");

        let result = load_from_env();
        clear_env();

        let config = result.expect("config from env");
        assert_eq!(config.base_url, "https://graph.example/v1.0");
        assert_eq!(config.api, ApiKind::Graph);
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_backoff_ms, 50);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.expire_after_secs, 60);
        assert_eq!(config.client_tag.as_deref(), Some("reports"));
        assert_eq!(config.log_level, LogLevel::Verbose);
    }

    #[test]
    fn test_load_from_env_missing_base_url() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, QueryError::Config(_)), "Should be a Config error");
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("QUERYKIT_BASE_URL", "https://x.example/sites/dev");
        std::env::set_var("QUERYKIT_RETRY_ATTEMPTS", "many");
        let result = load_from_env();
        clear_env();

        assert!(matches!(
            result,
            Err(QueryError::Config(message)) if message.contains("QUERYKIT_RETRY_ATTEMPTS")
        ));
    }

    #[test]
    fn test_load_from_env_rejects_zero_attempts() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("QUERYKIT_BASE_URL", "https://x.example/sites/dev");
        std::env::set_var("QUERYKIT_RETRY_ATTEMPTS", "0");
        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(QueryError::Config(_))));
    }

    #[test]
    fn test_parse_config_json() {
        let json_content = r#"{
            "base_url": "https://x.example/sites/dev",
            "retry": { "max_attempts": 2 }
        }"#;

        let config = parse_config(json_content, Path::new("querykit.json")).expect("valid JSON");
        assert_eq!(config.api, ApiKind::Document);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.base_backoff_ms, 200);
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_content = r#"
base_url = "https://graph.example/v1.0"
api = "graph"

[cache]
enabled = true
store = "durable"
durable_path = "/tmp/querykit-cache"

[headers]
"X-Team" = "reports"
"#;

        let config = parse_config(toml_content, Path::new("querykit.toml")).expect("valid TOML");
        assert_eq!(config.cache.store, CacheStoreKind::Durable);
        assert_eq!(config.headers.get("X-Team").map(String::as_str), Some("reports"));
    }

    #[test]
    fn test_parse_config_validates() {
        let result = parse_config(r#"{ "base_url": "relative/path" }"#, Path::new("querykit.json"));
        assert!(matches!(result, Err(QueryError::Config(_))));
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("base_url: x", Path::new("querykit.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/querykit.json")));
        assert!(matches!(result, Err(QueryError::Config(_))));
    }
}
