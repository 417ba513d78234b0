//! Upstream events feed
//!
//! `EventSource` is the seam the fetch cycle depends on; `GitHubEventSource`
//! is the production implementation, a single authenticated `GET` against
//! the public events endpoint.
//!
//! ## API Reference
//!
//! Endpoint: https://api.github.com/events
//! Returns: JSON array of event objects (first page only)

use super::error::FetchError;
use super::types::{parse_batch, GitHubEvent};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use std::env;
use std::time::Duration;

pub const DEFAULT_EVENTS_URL: &str = "https://api.github.com/events";

pub const TOKEN_ENV_VAR: &str = "GITHUB_ACCESS_TOKEN";

/// Source of event batches, one call per cycle
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch one batch of events
    ///
    /// Errors terminate the current cycle only.
    async fn fetch_batch(&self) -> Result<Vec<GitHubEvent>, FetchError>;
}

/// Where the upstream token comes from
#[derive(Debug, Clone)]
pub enum Credential {
    /// Fixed at construction; `None` means no token configured
    Static(Option<String>),
    /// Read from the named environment variable on every cycle
    Env(String),
}

impl Credential {
    /// Resolve the token for this cycle
    ///
    /// A blank value counts as missing.
    pub fn resolve(&self) -> Result<String, FetchError> {
        let (token, name) = match self {
            Credential::Static(token) => (token.clone(), "static credential"),
            Credential::Env(var) => (env::var(var).ok(), var.as_str()),
        };

        match token {
            Some(t) if !t.trim().is_empty() => Ok(t),
            _ => Err(FetchError::MissingCredential(name.to_string())),
        }
    }
}

impl Default for Credential {
    fn default() -> Self {
        Credential::Env(TOKEN_ENV_VAR.to_string())
    }
}

/// HTTP client for the events endpoint
pub struct GitHubEventSource {
    client: reqwest::Client,
    url: String,
    credential: Credential,
}

impl GitHubEventSource {
    /// Build a source with a bounded request timeout
    pub fn new(
        url: impl Into<String>,
        credential: Credential,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            credential,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EventSource for GitHubEventSource {
    async fn fetch_batch(&self) -> Result<Vec<GitHubEvent>, FetchError> {
        let token = self.credential.resolve()?;

        let response = self
            .client
            .get(&self.url)
            .header(AUTHORIZATION, format!("token {}", token))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, concat!("ghflow/", env!("CARGO_PKG_VERSION")))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let batch = parse_batch(&body)?;

        log::debug!("📥 Fetched {} events from {}", batch.len(), self.url);
        Ok(batch)
    }
}
