//! Retention sweep over the event store
//!
//! Never run by the fetch cycle. The read API exposes it as an
//! operator-triggered endpoint.

use super::db::EventStore;
use super::error::StoreError;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub threshold: DateTime<Utc>,
    pub deleted: usize,
}

/// Cutoff for a retention window ending at `now`
pub fn retention_threshold(now: DateTime<Utc>, retention: Duration) -> DateTime<Utc> {
    now - retention
}

/// Delete every stored event older than `retention` relative to `now`
pub async fn run_retention_sweep(
    store: &dyn EventStore,
    retention: Duration,
    now: DateTime<Utc>,
) -> Result<SweepReport, StoreError> {
    let threshold = retention_threshold(now, retention);

    match store.delete_older_than(threshold).await {
        Ok(deleted) => {
            log::info!("🧹 Retention sweep removed {} events older than {}", deleted, threshold);
            Ok(SweepReport { threshold, deleted })
        }
        Err(e) => {
            log::error!("❌ Retention sweep failed: {}", e);
            Err(e)
        }
    }
}
