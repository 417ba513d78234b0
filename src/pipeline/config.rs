//! Runtime configuration from environment variables
//!
//! Loaded once at startup (after `.env`), with defaults for everything but
//! the upstream token. The token itself is not stored here: it is resolved
//! from the environment on every fetch cycle.

use super::aggregator::{TrackerCapacities, DEFAULT_ACTORS_CAPACITY, DEFAULT_REPO_URLS_CAPACITY};
use super::upstream::{DEFAULT_EVENTS_URL, TOKEN_ENV_VAR};
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for the ingestion runtime
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Environment variable holding the upstream token
    pub token_env_var: String,

    /// Upstream events endpoint
    pub events_url: String,

    /// Path to SQLite database file
    pub db_path: String,

    /// Fetch interval in seconds
    pub fetch_interval_secs: u64,

    /// Upstream request timeout in seconds
    pub upstream_timeout_secs: u64,

    /// Age in days after which the retention sweep deletes events
    pub retention_days: i64,

    /// Read API bind address
    pub http_bind_addr: SocketAddr,

    pub actors_capacity: usize,
    pub repo_urls_capacity: usize,

    /// `None` keeps the email list unbounded
    pub emails_capacity: Option<usize>,

    /// Run one cycle immediately at startup instead of after the first interval
    pub fetch_on_startup: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            token_env_var: TOKEN_ENV_VAR.to_string(),
            events_url: DEFAULT_EVENTS_URL.to_string(),
            db_path: "data/ghflow.db".to_string(),
            fetch_interval_secs: 60,
            upstream_timeout_secs: 10,
            retention_days: 1,
            http_bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            actors_capacity: DEFAULT_ACTORS_CAPACITY,
            repo_urls_capacity: DEFAULT_REPO_URLS_CAPACITY,
            emails_capacity: None,
            fetch_on_startup: true,
        }
    }
}

impl IngestConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `GHFLOW_EVENTS_URL` (default: https://api.github.com/events)
    /// - `GHFLOW_DB_PATH` (default: data/ghflow.db)
    /// - `FETCH_INTERVAL_SECS` (default: 60)
    /// - `UPSTREAM_TIMEOUT_SECS` (default: 10)
    /// - `RETENTION_DAYS` (default: 1)
    /// - `HTTP_BIND_ADDR` (default: 0.0.0.0:8080)
    /// - `UNIQUE_ACTORS_CAPACITY` (default: 50)
    /// - `UNIQUE_REPO_URLS_CAPACITY` (default: 20)
    /// - `UNIQUE_EMAILS_CAPACITY` (default: unbounded)
    /// - `FETCH_ON_STARTUP` (default: true)
    ///
    /// Unset variables fall back to defaults; set but unparsable ones are an
    /// error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            token_env_var: defaults.token_env_var,
            events_url: env::var("GHFLOW_EVENTS_URL").unwrap_or(defaults.events_url),
            db_path: env::var("GHFLOW_DB_PATH").unwrap_or(defaults.db_path),
            fetch_interval_secs: parse_var("FETCH_INTERVAL_SECS")?
                .unwrap_or(defaults.fetch_interval_secs),
            upstream_timeout_secs: parse_var("UPSTREAM_TIMEOUT_SECS")?
                .unwrap_or(defaults.upstream_timeout_secs),
            retention_days: parse_var("RETENTION_DAYS")?.unwrap_or(defaults.retention_days),
            http_bind_addr: parse_var("HTTP_BIND_ADDR")?.unwrap_or(defaults.http_bind_addr),
            actors_capacity: parse_var("UNIQUE_ACTORS_CAPACITY")?
                .unwrap_or(defaults.actors_capacity),
            repo_urls_capacity: parse_var("UNIQUE_REPO_URLS_CAPACITY")?
                .unwrap_or(defaults.repo_urls_capacity),
            emails_capacity: parse_var("UNIQUE_EMAILS_CAPACITY")?,
            fetch_on_startup: parse_var("FETCH_ON_STARTUP")?.unwrap_or(defaults.fetch_on_startup),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.events_url.starts_with("http://") && !self.events_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "GHFLOW_EVENTS_URL must start with http:// or https://".to_string(),
            ));
        }

        if self.fetch_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "FETCH_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }

        if self.upstream_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "UPSTREAM_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.retention_days < 0 {
            return Err(ConfigError::InvalidValue(
                "RETENTION_DAYS cannot be negative".to_string(),
            ));
        }

        Ok(())
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days)
    }

    pub fn tracker_capacities(&self) -> TrackerCapacities {
        TrackerCapacities {
            actors: Some(self.actors_capacity),
            repo_urls: Some(self.repo_urls_capacity),
            emails: self.emails_capacity,
        }
    }
}

/// Serializes tests that mutate process-wide environment variables
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .to_lowercase()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(format!("{}={}", name, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: &[&str] = &[
        "GHFLOW_EVENTS_URL",
        "GHFLOW_DB_PATH",
        "FETCH_INTERVAL_SECS",
        "UPSTREAM_TIMEOUT_SECS",
        "RETENTION_DAYS",
        "HTTP_BIND_ADDR",
        "UNIQUE_ACTORS_CAPACITY",
        "UNIQUE_REPO_URLS_CAPACITY",
        "UNIQUE_EMAILS_CAPACITY",
        "FETCH_ON_STARTUP",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let config = IngestConfig::from_env().unwrap();

        assert_eq!(config.events_url, "https://api.github.com/events");
        assert_eq!(config.db_path, "data/ghflow.db");
        assert_eq!(config.fetch_interval(), Duration::from_secs(60));
        assert_eq!(config.upstream_timeout(), Duration::from_secs(10));
        assert_eq!(config.retention(), chrono::Duration::days(1));
        assert_eq!(config.http_bind_addr.port(), 8080);
        assert_eq!(config.tracker_capacities(), TrackerCapacities::default());
        assert!(config.fetch_on_startup);
        assert_eq!(config.token_env_var, "GITHUB_ACCESS_TOKEN");
    }

    #[test]
    fn test_custom_config() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("GHFLOW_EVENTS_URL", "http://localhost:9000/events");
        env::set_var("GHFLOW_DB_PATH", "/tmp/ghflow-test.db");
        env::set_var("FETCH_INTERVAL_SECS", "15");
        env::set_var("RETENTION_DAYS", "30");
        env::set_var("HTTP_BIND_ADDR", "127.0.0.1:3000");
        env::set_var("UNIQUE_EMAILS_CAPACITY", "500");
        env::set_var("FETCH_ON_STARTUP", "False");

        let config = IngestConfig::from_env().unwrap();

        assert_eq!(config.events_url, "http://localhost:9000/events");
        assert_eq!(config.db_path, "/tmp/ghflow-test.db");
        assert_eq!(config.fetch_interval_secs, 15);
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.http_bind_addr, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(config.tracker_capacities().emails, Some(500));
        assert!(!config.fetch_on_startup);

        clear_env();
    }

    #[test]
    fn test_invalid_values_rejected() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        env::set_var("FETCH_INTERVAL_SECS", "soon");
        assert!(matches!(IngestConfig::from_env(), Err(ConfigError::InvalidValue(_))));

        env::set_var("FETCH_INTERVAL_SECS", "0");
        assert!(IngestConfig::from_env().is_err());
        env::remove_var("FETCH_INTERVAL_SECS");

        env::set_var("GHFLOW_EVENTS_URL", "ftp://example.com");
        assert!(IngestConfig::from_env().is_err());

        clear_env();
    }

    #[test]
    fn test_unparsable_value_is_named_in_error() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        env::set_var("UNIQUE_ACTORS_CAPACITY", "many");
        let err = IngestConfig::from_env().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration value: UNIQUE_ACTORS_CAPACITY=many"
        );

        clear_env();
    }
}
