//! Event store: durable record of every ingested event
//!
//! The fetch cycle only needs `store`; `delete_older_than` backs the
//! operator-triggered retention sweep. `list_all`, `count_by_type` and
//! `distinct_actors` back the database reporting endpoints.

use super::error::StoreError;
use super::types::GitHubEvent;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Schema for the raw event table
///
/// Commits are not persisted; only the fields needed for reporting and
/// retention are. `created_at` holds Unix milliseconds.
pub const EVENTS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS github_events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type  TEXT NOT NULL,
    actor       TEXT NOT NULL,
    repo_url    TEXT NOT NULL,
    created_at  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_github_events_created_at ON github_events(created_at);
"#;

/// Persistence contract used by the ingestion pipeline
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Durably append one event
    async fn store(&self, event: &GitHubEvent) -> Result<(), StoreError>;

    /// Delete every event created strictly before `threshold`
    ///
    /// Returns the number of rows removed.
    async fn delete_older_than(&self, threshold: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Every stored event, oldest insert first
    async fn list_all(&self) -> Result<Vec<GitHubEvent>, StoreError>;

    /// Number of stored events per type
    async fn count_by_type(&self) -> Result<BTreeMap<String, u64>, StoreError>;

    /// Distinct actor logins across all stored events, sorted
    async fn distinct_actors(&self) -> Result<Vec<String>, StoreError>;
}

/// Apply the event schema to an open connection
///
/// Idempotent (`IF NOT EXISTS`). Enables WAL for a file-backed database.
pub fn run_schema_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.execute_batch(EVENTS_SCHEMA)?;
    log::debug!("🔧 Event schema ready");
    Ok(())
}

/// SQLite implementation of `EventStore`
///
/// One connection shared by every caller behind a mutex.
pub struct SqliteEventStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEventStore {
    /// Open (or create) the database file and apply the schema
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        run_schema_migrations(&conn)?;

        log::info!("✅ Event store opened at {}", db_path.display());
        Ok(Self::from_connection(conn))
    }

    /// In-memory store, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(EVENTS_SCHEMA)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn store(&self, event: &GitHubEvent) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO github_events (event_type, actor, repo_url, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                event.event_type,
                event.actor.login,
                event.repo.url,
                event.created_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    async fn delete_older_than(&self, threshold: DateTime<Utc>) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM github_events WHERE created_at < ?1",
            params![threshold.timestamp_millis()],
        )?;
        Ok(deleted)
    }

    async fn list_all(&self) -> Result<Vec<GitHubEvent>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT event_type, actor, repo_url, created_at FROM github_events ORDER BY id",
        )?;
        let events = stmt
            .query_map([], |row| {
                let created_at: i64 = row.get(3)?;
                Ok(GitHubEvent::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    Utc.timestamp_millis_opt(created_at).single().unwrap_or_default(),
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    async fn count_by_type(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT event_type, COUNT(*) FROM github_events GROUP BY event_type")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (event_type, count) = row?;
            counts.insert(event_type, count.max(0) as u64);
        }
        Ok(counts)
    }

    async fn distinct_actors(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT DISTINCT actor FROM github_events ORDER BY actor")?;
        let actors = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(actors)
    }
}
