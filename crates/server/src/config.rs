//! Application configuration loaded from environment variables.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}', expected 'text' or 'json'")),
        }
    }
}

#[derive(Debug, Error)]
#[error("Invalid value '{value}' for {key}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Runtime configuration.
///
/// Reads from environment variables:
/// - `METRICS_ADDR`: Prometheus listener (default: `0.0.0.0:9000`)
/// - `RUST_LOG`: tracing filter directive (default: `info`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `PROJECTION_RETRY_MS`: wait after a failed projection pass (default: `500`)
/// - `PROJECTION_BATCH_SIZE`: events read per page (default: `256`)
/// - `LOCK_EVICTION_SECS`: idle capture lock sweep interval (default: `300`)
/// - `CAPTURE_MAX_ATTEMPTS`: capture saves tried on conflict (default: `3`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub metrics_addr: SocketAddr,
    pub log_level: String,
    pub log_format: LogFormat,
    pub projection_retry: Duration,
    pub projection_batch_size: usize,
    pub lock_eviction_interval: Duration,
    pub capture_max_attempts: u32,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from any key lookup, falling back to defaults
    /// for missing keys. Present but unparsable values are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            metrics_addr: parse(&lookup, "METRICS_ADDR", defaults.metrics_addr)?,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: parse(&lookup, "LOG_FORMAT", defaults.log_format)?,
            projection_retry: Duration::from_millis(parse(
                &lookup,
                "PROJECTION_RETRY_MS",
                500u64,
            )?),
            projection_batch_size: positive(&lookup, "PROJECTION_BATCH_SIZE", 256)?,
            lock_eviction_interval: Duration::from_secs(positive(
                &lookup,
                "LOCK_EVICTION_SECS",
                300,
            )? as u64),
            capture_max_attempts: positive(&lookup, "CAPTURE_MAX_ATTEMPTS", 3)? as u32,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 9000)),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            projection_retry: Duration::from_millis(500),
            projection_batch_size: 256,
            lock_eviction_interval: Duration::from_secs(300),
            capture_max_attempts: 3,
        }
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

fn positive(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u32,
) -> Result<usize, ConfigError> {
    let value: u32 = parse(lookup, key, default)?;
    if value == 0 {
        return Err(ConfigError {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = from(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.metrics_addr.to_string(), "0.0.0.0:9000");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.capture_max_attempts, 3);
    }

    #[test]
    fn test_overrides() {
        let config = from(&[
            ("METRICS_ADDR", "127.0.0.1:9100"),
            ("RUST_LOG", "debug,handlers=trace"),
            ("LOG_FORMAT", "JSON"),
            ("PROJECTION_RETRY_MS", "50"),
            ("PROJECTION_BATCH_SIZE", "32"),
            ("LOCK_EVICTION_SECS", "60"),
            ("CAPTURE_MAX_ATTEMPTS", "5"),
        ])
        .unwrap();
        assert_eq!(config.metrics_addr.port(), 9100);
        assert_eq!(config.log_level, "debug,handlers=trace");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.projection_retry, Duration::from_millis(50));
        assert_eq!(config.projection_batch_size, 32);
        assert_eq!(config.lock_eviction_interval, Duration::from_secs(60));
        assert_eq!(config.capture_max_attempts, 5);
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = from(&[("PROJECTION_BATCH_SIZE", "lots")]).unwrap_err();
        assert_eq!(err.key, "PROJECTION_BATCH_SIZE");

        let err = from(&[("CAPTURE_MAX_ATTEMPTS", "0")]).unwrap_err();
        assert_eq!(err.key, "CAPTURE_MAX_ATTEMPTS");

        let err = from(&[("LOG_FORMAT", "xml")]).unwrap_err();
        assert!(err.to_string().contains("xml"));
    }
}
