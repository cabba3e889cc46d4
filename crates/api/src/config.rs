use std::path::PathBuf;

use crate::ws::registry::DEFAULT_OUTBOUND_BUFFER;

/// Invalid value in an environment variable.
#[derive(Debug, thiserror::Error)]
#[error("{var} must be a valid {expected}, got {value:?}")]
pub struct ConfigError {
    pub var: &'static str,
    pub expected: &'static str,
    pub value: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `127.0.0.1`).
    pub host: String,
    /// Bind port (default: `8188`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    /// Empty disables the CORS layer.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Interval between WebSocket pings (default: `30`).
    pub heartbeat_interval_secs: u64,
    /// How long shutdown waits for queued events to drain (default: `5`).
    pub shutdown_timeout_secs: u64,
    /// Messages buffered per connection before events to it are dropped
    /// (default: `256`).
    pub outbound_buffer: usize,
    /// Optional JSON file with node class definitions.
    pub node_catalog_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8188,
            cors_origins: Vec::new(),
            request_timeout_secs: 30,
            heartbeat_interval_secs: 30,
            shutdown_timeout_secs: 5,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            node_catalog_path: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default     |
    /// |---------------------------|-------------|
    /// | `HOST`                    | `127.0.0.1` |
    /// | `PORT`                    | `8188`      |
    /// | `CORS_ORIGINS`            | *(none)*    |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`        |
    /// | `HEARTBEAT_INTERVAL_SECS` | `30`        |
    /// | `SHUTDOWN_TIMEOUT_SECS`   | `5`         |
    /// | `OUTBOUND_BUFFER`         | `256`       |
    /// | `NODE_CATALOG_PATH`       | *(unset)*   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = lookup("HOST").unwrap_or(defaults.host);
        let port = parse_var(&lookup, "PORT", "u16", defaults.port)?;

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let request_timeout_secs = parse_var(
            &lookup,
            "REQUEST_TIMEOUT_SECS",
            "u64",
            defaults.request_timeout_secs,
        )?;
        let heartbeat_interval_secs = parse_var(
            &lookup,
            "HEARTBEAT_INTERVAL_SECS",
            "u64",
            defaults.heartbeat_interval_secs,
        )?;
        let shutdown_timeout_secs = parse_var(
            &lookup,
            "SHUTDOWN_TIMEOUT_SECS",
            "u64",
            defaults.shutdown_timeout_secs,
        )?;
        let outbound_buffer =
            parse_var(&lookup, "OUTBOUND_BUFFER", "usize", defaults.outbound_buffer)?;

        let node_catalog_path = lookup("NODE_CATALOG_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            heartbeat_interval_secs,
            shutdown_timeout_secs,
            outbound_buffer,
            node_catalog_path,
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError {
            var,
            expected,
            value,
        }),
    }
}
