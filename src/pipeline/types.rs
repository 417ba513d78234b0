//! Event records as reported by the upstream events feed
//!
//! Only the fields the pipeline reads are mapped. Anything missing or `null`
//! in the upstream JSON decodes to its default (empty string, empty commit
//! list, Unix epoch) so that a sparse record still flows through aggregation
//! and persistence like any other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One event from the upstream feed
///
/// Immutable once decoded: read once by the aggregator, written once to the
/// event store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitHubEvent {
    /// Event category, e.g. `PushEvent`
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub event_type: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub actor: Actor,

    #[serde(default, deserialize_with = "null_as_default")]
    pub repo: Repo,

    #[serde(default, deserialize_with = "null_as_default")]
    pub payload: Payload,

    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    #[serde(default, deserialize_with = "null_as_default")]
    pub login: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
}

/// Event payload; only push events carry commits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub commits: Vec<Commit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: Author,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
}

impl GitHubEvent {
    /// Convenience constructor used by tests and the store's read path
    pub fn new(
        event_type: impl Into<String>,
        login: impl Into<String>,
        repo_url: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            actor: Actor { login: login.into() },
            repo: Repo { url: repo_url.into() },
            payload: Payload::default(),
            created_at,
        }
    }

    /// Attach commit author emails to the payload
    pub fn with_commit_emails<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.payload.commits = emails
            .into_iter()
            .map(|email| Commit {
                author: Author { email: email.into() },
            })
            .collect();
        self
    }

    /// Iterator over the author email of every commit in the payload
    pub fn commit_emails(&self) -> impl Iterator<Item = &str> {
        self.payload.commits.iter().map(|c| c.author.email.as_str())
    }
}

/// Decode a batch of events from a response body
pub fn parse_batch(body: &[u8]) -> Result<Vec<GitHubEvent>, serde_json::Error> {
    serde_json::from_slice(body)
}

/// Treat an explicit JSON `null` the same as a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_full_push_event() {
        let body = br#"[{
            "id": "1",
            "type": "PushEvent",
            "actor": {"id": 7, "login": "octocat"},
            "repo": {"id": 9, "name": "octo/hello", "url": "https://api.github.com/repos/octo/hello"},
            "payload": {"commits": [
                {"sha": "a", "author": {"email": "a@example.com", "name": "A"}},
                {"sha": "b", "author": {"email": "b@example.com", "name": "B"}}
            ]},
            "created_at": "2023-10-01T12:00:00Z"
        }]"#;

        let batch = parse_batch(body).unwrap();
        assert_eq!(batch.len(), 1);

        let event = &batch[0];
        assert_eq!(event.event_type, "PushEvent");
        assert_eq!(event.actor.login, "octocat");
        assert_eq!(event.repo.url, "https://api.github.com/repos/octo/hello");
        assert_eq!(
            event.commit_emails().collect::<Vec<_>>(),
            vec!["a@example.com", "b@example.com"]
        );
        assert_eq!(
            event.created_at,
            Utc.with_ymd_and_hms(2023, 10, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_missing_and_null_fields_default_to_empty() {
        // Non-push events have no commits; some feeds send nulls
        let body = br#"[
            {"type": "WatchEvent", "actor": {"login": "x"}, "repo": {"url": "u"}, "payload": {"action": "started"}, "created_at": "2023-10-01T12:00:00Z"},
            {"type": null, "actor": null, "payload": {"commits": null}},
            {}
        ]"#;

        let batch = parse_batch(body).unwrap();
        assert_eq!(batch.len(), 3);
        assert!(batch[0].payload.commits.is_empty());

        assert_eq!(batch[1].event_type, "");
        assert_eq!(batch[1].actor.login, "");
        assert_eq!(batch[1].repo.url, "");
        assert!(batch[1].payload.commits.is_empty());

        assert_eq!(batch[2], GitHubEvent::default());
    }

    #[test]
    fn test_non_array_body_is_decode_error() {
        assert!(parse_batch(br#"{"message": "Bad credentials"}"#).is_err());
        assert!(parse_batch(b"not json").is_err());
    }
}
