//! # Event ingestion pipeline
//!
//! Polls the upstream events feed on a fixed interval, keeps bounded
//! in-memory summaries for the read API and persists every raw event.
//!
//! ```text
//! FetchScheduler (tick / manual trigger, single-flight)
//!     ↓
//! FetchCycle::run()
//!     ├─ EventSource::fetch_batch()      one upstream GET
//!     ├─ EventAggregator::process()      counts + unique lists
//!     └─ EventStore::store() per event   failures logged, batch continues
//! ```
//!
//! ## Module Organization
//!
//! - `types` - Event record decoded from the upstream JSON
//! - `tracker` - Bounded unique-value list
//! - `aggregator` - Owned aggregate state (single source of truth)
//! - `db` - Event store trait and SQLite implementation
//! - `upstream` - Upstream source trait and HTTP client
//! - `ingestion` - Fetch-and-process cycle
//! - `scheduler` - Single-flight periodic scheduler and manual trigger
//! - `retention` - Age-based cleanup of stored events
//! - `config` - Environment configuration
//! - `error` - Error types

pub mod aggregator;
pub mod config;
pub mod db;
pub mod error;
pub mod ingestion;
pub mod retention;
pub mod scheduler;
pub mod tracker;
pub mod types;
pub mod upstream;

// Re-export commonly used types
pub use aggregator::{AggregateSnapshot, EventAggregator, TrackerCapacities};
pub use config::IngestConfig;
pub use db::{EventStore, SqliteEventStore};
pub use error::{FailureKind, FetchError, StoreError};
pub use ingestion::{CycleReport, FetchCycle};
pub use scheduler::{FetchScheduler, FetchState, TickOutcome, TriggerOutcome};
pub use tracker::UniqueTracker;
pub use types::GitHubEvent;
pub use upstream::{Credential, EventSource, GitHubEventSource};
