//! In-memory aggregate state: event-type counts and recently seen values
//!
//! `EventAggregator` is the single source of truth for what the read API
//! serves. It is created once, shared behind an `Arc` by the fetch cycle
//! (the only writer) and the HTTP handlers (readers). Every field has its own
//! lock, so a reader of one field never waits on another.

use super::tracker::UniqueTracker;
use super::types::GitHubEvent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default bound for the actor list
pub const DEFAULT_ACTORS_CAPACITY: usize = 50;

/// Default bound for the repository URL list
pub const DEFAULT_REPO_URLS_CAPACITY: usize = 20;

/// Tracker bounds for an aggregator
///
/// `None` means unbounded. Emails are unbounded by default; see DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerCapacities {
    pub actors: Option<usize>,
    pub repo_urls: Option<usize>,
    pub emails: Option<usize>,
}

impl Default for TrackerCapacities {
    fn default() -> Self {
        Self {
            actors: Some(DEFAULT_ACTORS_CAPACITY),
            repo_urls: Some(DEFAULT_REPO_URLS_CAPACITY),
            emails: None,
        }
    }
}

/// Point-in-time copy of every aggregate field
///
/// Each field is individually consistent; the four are not read under one
/// lock, so a snapshot taken mid-batch may mix fields from before and after
/// the same record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub event_type_count: BTreeMap<String, u64>,
    pub unique_actors: Vec<String>,
    pub unique_repo_urls: Vec<String>,
    pub unique_emails: Vec<String>,
}

#[derive(Debug)]
pub struct EventAggregator {
    event_type_count: Mutex<BTreeMap<String, u64>>,
    unique_actors: UniqueTracker,
    unique_repo_urls: UniqueTracker,
    unique_emails: UniqueTracker,
}

impl EventAggregator {
    /// Aggregator with the default bounds (actors 50, repo URLs 20, emails unbounded)
    pub fn new() -> Self {
        Self::with_capacities(TrackerCapacities::default())
    }

    pub fn with_capacities(capacities: TrackerCapacities) -> Self {
        Self {
            event_type_count: Mutex::new(BTreeMap::new()),
            unique_actors: UniqueTracker::with_capacity(capacities.actors),
            unique_repo_urls: UniqueTracker::with_capacity(capacities.repo_urls),
            unique_emails: UniqueTracker::with_capacity(capacities.emails),
        }
    }

    /// Apply a batch of events in arrival order
    ///
    /// For each event: bump its type count, record the actor login and repo
    /// URL, then record every commit author email. Never fails; empty strings
    /// take part in deduplication like any other value.
    pub fn process(&self, batch: &[GitHubEvent]) {
        for event in batch {
            self.record(event);
        }
    }

    /// Apply a single event
    pub fn record(&self, event: &GitHubEvent) {
        {
            let mut counts = self.counts();
            *counts.entry(event.event_type.clone()).or_insert(0) += 1;
        }

        self.unique_actors.insert(&event.actor.login);
        self.unique_repo_urls.insert(&event.repo.url);

        for email in event.commit_emails() {
            self.unique_emails.insert(email);
        }
    }

    pub fn event_type_counts(&self) -> BTreeMap<String, u64> {
        self.counts().clone()
    }

    pub fn event_type_count(&self, event_type: &str) -> u64 {
        self.counts().get(event_type).copied().unwrap_or(0)
    }

    pub fn unique_actors(&self) -> Vec<String> {
        self.unique_actors.snapshot()
    }

    pub fn unique_repo_urls(&self) -> Vec<String> {
        self.unique_repo_urls.snapshot()
    }

    pub fn unique_emails(&self) -> Vec<String> {
        self.unique_emails.snapshot()
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        AggregateSnapshot {
            event_type_count: self.event_type_counts(),
            unique_actors: self.unique_actors(),
            unique_repo_urls: self.unique_repo_urls(),
            unique_emails: self.unique_emails(),
        }
    }

    fn counts(&self) -> MutexGuard<'_, BTreeMap<String, u64>> {
        self.event_type_count
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventAggregator {
    fn default() -> Self {
        Self::new()
    }
}
