//! Bounded, order-preserving set of distinct strings
//!
//! Used for the "recently seen" lists: actors, repository URLs and commit
//! author emails. Each tracker owns its lock; callers only see `insert` and
//! by-value snapshots, never the guard.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Recency-limited list of unique values with FIFO eviction
///
/// Invariants, held under the tracker's mutex for the whole
/// check-then-append-then-evict sequence:
/// - no duplicates (string equality)
/// - retained values keep their insertion order
/// - never more than `capacity` values; on overflow the single oldest value
///   is evicted
/// - inserting a value already present changes nothing
#[derive(Debug)]
pub struct UniqueTracker {
    /// `None` means unbounded
    capacity: Option<usize>,
    inner: Mutex<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl UniqueTracker {
    /// Tracker that retains at most `capacity` values
    ///
    /// A capacity of 0 retains nothing.
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity))
    }

    /// Tracker that never evicts
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// `None` means unbounded
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            inner: Mutex::new(TrackerInner::default()),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Insert a value, enforcing uniqueness and the capacity bound
    ///
    /// Returns `true` if the value was appended, `false` if it was already
    /// present (or the capacity is 0).
    pub fn insert(&self, value: &str) -> bool {
        if self.capacity == Some(0) {
            return false;
        }

        let mut inner = self.lock();
        if inner.members.contains(value) {
            return false;
        }

        if let Some(capacity) = self.capacity {
            if inner.order.len() >= capacity {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.members.remove(&oldest);
                }
            }
        }

        inner.order.push_back(value.to_string());
        inner.members.insert(value.to_string());
        true
    }

    /// Copy of the retained values, oldest first
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().order.iter().cloned().collect()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.lock().members.contains(value)
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // `order` and `members` are updated in step, so a poisoned lock still
    // holds a consistent pair.
    fn lock(&self) -> MutexGuard<'_, TrackerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
