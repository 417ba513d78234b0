//! Fetch-and-process cycle
//!
//! One cycle = fetch one batch upstream, fold it into the aggregator, then
//! persist each event. Steps in order, each a possible early exit:
//!
//! 1. Resolve the credential (missing → cycle ends, nothing fetched)
//! 2. Single upstream request (non-success / transport error → cycle ends)
//! 3. Decode the body (malformed → cycle ends)
//! 4. Aggregate the whole batch in memory
//! 5. Store each event; a failed store is logged and counted, the loop goes on
//!
//! A cycle never retries and never propagates a failure beyond its caller's
//! log line. Concurrency control lives in the scheduler, not here.

use super::aggregator::EventAggregator;
use super::db::EventStore;
use super::error::FetchError;
use super::upstream::EventSource;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Outcome of a cycle that got as far as aggregation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Events received and aggregated
    pub fetched: usize,
    /// Events successfully persisted
    pub stored: usize,
    /// Batch positions whose store call failed
    pub failed_indices: Vec<usize>,
    pub elapsed_ms: u64,
}

impl CycleReport {
    pub fn store_failures(&self) -> usize {
        self.failed_indices.len()
    }
}

/// The unit of work run per scheduler tick or manual trigger
pub struct FetchCycle {
    source: Arc<dyn EventSource>,
    aggregator: Arc<EventAggregator>,
    store: Arc<dyn EventStore>,
}

impl FetchCycle {
    pub fn new(
        source: Arc<dyn EventSource>,
        aggregator: Arc<EventAggregator>,
        store: Arc<dyn EventStore>,
    ) -> Self {
        Self {
            source,
            aggregator,
            store,
        }
    }

    pub fn aggregator(&self) -> &Arc<EventAggregator> {
        &self.aggregator
    }

    /// Run one cycle to completion
    ///
    /// `Err` means the cycle stopped before aggregation (steps 1-3); the
    /// error is already logged. Per-event store failures are reported in the
    /// `CycleReport`, not as an `Err`.
    pub async fn run(&self) -> Result<CycleReport, FetchError> {
        let started = Instant::now();
        log::info!("🔄 Fetching and processing events...");

        let batch = match self.source.fetch_batch().await {
            Ok(batch) => batch,
            Err(e) => {
                log::error!("❌ Fetch cycle aborted ({}): {}", e.kind().as_str(), e);
                return Err(e);
            }
        };

        self.aggregator.process(&batch);

        let mut report = CycleReport {
            fetched: batch.len(),
            ..CycleReport::default()
        };

        for (index, event) in batch.iter().enumerate() {
            match self.store.store(event).await {
                Ok(()) => report.stored += 1,
                Err(e) => {
                    log::warn!(
                        "⚠️  Failed to store event #{} ({} by {}): {}",
                        index,
                        event.event_type,
                        event.actor.login,
                        e
                    );
                    report.failed_indices.push(index);
                }
            }
        }

        report.elapsed_ms = started.elapsed().as_millis() as u64;

        if report.failed_indices.is_empty() {
            log::info!(
                "✅ Fetch cycle complete: {} events stored | {}ms",
                report.stored,
                report.elapsed_ms
            );
        } else {
            log::warn!(
                "⚠️  Fetch cycle complete: {} fetched, {} stored, {} store failures | {}ms",
                report.fetched,
                report.stored,
                report.store_failures(),
                report.elapsed_ms
            );
        }

        Ok(report)
    }
}
