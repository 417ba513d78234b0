//! Error types for the ingestion pipeline
//!
//! None of these ever escape a fetch cycle: the cycle logs them and the
//! scheduler goes back to idle. They are returned (rather than only logged)
//! so the manual trigger can report what happened.

use std::fmt;

/// Failure class of an aborted cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Missing credential; fix the environment, the process keeps running
    Configuration,
    /// Non-success status, network failure or timeout
    Transport,
    /// Response body was not a JSON array of events
    Decode,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Configuration => "configuration",
            FailureKind::Transport => "transport",
            FailureKind::Decode => "decode",
        }
    }
}

/// Reasons a cycle stops before aggregating anything
#[derive(Debug)]
pub enum FetchError {
    MissingCredential(String),
    Client(String),
    Transport(reqwest::Error),
    Status(u16),
    Decode(serde_json::Error),
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::MissingCredential(_) | FetchError::Client(_) => FailureKind::Configuration,
            FetchError::Transport(_) | FetchError::Status(_) => FailureKind::Transport,
            FetchError::Decode(_) => FailureKind::Decode,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transport(err)
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err)
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::MissingCredential(var) => {
                write!(f, "Upstream credential not found (set {})", var)
            }
            FetchError::Client(msg) => write!(f, "Failed to build upstream request: {}", msg),
            FetchError::Transport(e) if e.is_timeout() => write!(f, "Upstream request timed out: {}", e),
            FetchError::Transport(e) => write!(f, "Upstream request failed: {}", e),
            FetchError::Status(code) => write!(f, "Upstream returned non-success status {}", code),
            FetchError::Decode(e) => write!(f, "Failed to parse upstream events: {}", e),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Transport(e) => Some(e),
            FetchError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

/// Event store failures
#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Database(String),
    LockPoisoned,
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "IO error: {}", e),
            StoreError::Database(e) => write!(f, "Database error: {}", e),
            StoreError::LockPoisoned => write!(f, "Database connection lock poisoned"),
        }
    }
}

impl std::error::Error for StoreError {}
