//! Single-flight fetch scheduling
//!
//! The scheduler is a two-state machine, `Idle` and `Fetching`. A timer tick
//! or a manual trigger that finds it `Idle` flips it to `Fetching` with one
//! atomic compare-and-swap and launches a cycle; anything arriving while a
//! cycle runs is dropped, never queued. The flag is released by a guard that
//! moves into the cycle task, so it returns to `Idle` however the cycle ends
//! (success, error or panic).

use super::error::FetchError;
use super::ingestion::{CycleReport, FetchCycle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Fetching,
}

impl FetchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchState::Idle => "idle",
            FetchState::Fetching => "fetching",
        }
    }
}

/// At-most-one-in-flight flag shared by every trigger path
#[derive(Debug, Default)]
pub struct SingleFlight {
    fetching: AtomicBool,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Idle → Fetching`, or `None` if a cycle is already in flight
    pub fn try_begin(self: &Arc<Self>) -> Option<FlightGuard> {
        self.fetching
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard {
                flight: Arc::clone(self),
            })
    }

    pub fn state(&self) -> FetchState {
        if self.fetching.load(Ordering::Acquire) {
            FetchState::Fetching
        } else {
            FetchState::Idle
        }
    }
}

/// Holds the scheduler in `Fetching`; dropping it returns to `Idle`
#[derive(Debug)]
pub struct FlightGuard {
    flight: Arc<SingleFlight>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flight.fetching.store(false, Ordering::Release);
    }
}

/// Result of a timer tick
#[derive(Debug)]
pub enum TickOutcome {
    /// A cycle was spawned; the handle resolves when it finishes
    Launched(JoinHandle<Result<CycleReport, FetchError>>),
    /// A cycle was already running; this tick is dropped
    Skipped,
}

/// Result of a manual trigger
#[derive(Debug)]
pub enum TriggerOutcome {
    Completed(CycleReport),
    Failed(FetchError),
    /// Another cycle held the flight; nothing was run
    AlreadyRunning,
    /// The cycle task panicked or was cancelled
    Interrupted(String),
}

/// Drives `FetchCycle` on a fixed interval and on demand, one at a time
pub struct FetchScheduler {
    cycle: Arc<FetchCycle>,
    flight: Arc<SingleFlight>,
    interval: Duration,
}

impl FetchScheduler {
    pub fn new(cycle: Arc<FetchCycle>, interval: Duration) -> Self {
        Self {
            cycle,
            flight: Arc::new(SingleFlight::new()),
            interval,
        }
    }

    pub fn state(&self) -> FetchState {
        self.flight.state()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Handle one timer tick: launch a cycle if idle, drop the tick otherwise
    pub fn tick(&self) -> TickOutcome {
        match self.flight.try_begin() {
            Some(guard) => TickOutcome::Launched(self.launch(guard)),
            None => {
                log::debug!("⏭️  Fetch still in flight, skipping tick");
                TickOutcome::Skipped
            }
        }
    }

    /// Run one cycle now and wait for it, unless one is already running
    ///
    /// The cycle runs in its own task, so dropping this future (e.g. an HTTP
    /// client disconnecting) does not cut the cycle short.
    pub async fn trigger(&self) -> TriggerOutcome {
        let Some(guard) = self.flight.try_begin() else {
            log::info!("⏭️  Manual fetch requested while a cycle is running, ignoring");
            return TriggerOutcome::AlreadyRunning;
        };

        match self.launch(guard).await {
            Ok(Ok(report)) => TriggerOutcome::Completed(report),
            Ok(Err(e)) => TriggerOutcome::Failed(e),
            Err(e) => {
                log::error!("❌ Fetch cycle task failed: {}", e);
                TriggerOutcome::Interrupted(e.to_string())
            }
        }
    }

    /// Tick forever on the configured interval
    ///
    /// With `fetch_immediately` the first tick fires at once, otherwise after
    /// one full interval. Overrunning cycles make later ticks skip; missed
    /// ticks are not replayed. Runs until the task is aborted.
    pub async fn run(self: Arc<Self>, fetch_immediately: bool) {
        log::info!(
            "⏰ Starting fetch scheduler (interval: {}s)",
            self.interval.as_secs()
        );

        let start = if fetch_immediately {
            Instant::now()
        } else {
            Instant::now() + self.interval
        };
        let mut timer = interval_at(start, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            timer.tick().await;
            // Dropping the handle detaches the cycle; the guard inside it
            // still resets the state when it finishes.
            let _ = self.tick();
        }
    }

    fn launch(&self, guard: FlightGuard) -> JoinHandle<Result<CycleReport, FetchError>> {
        let cycle = Arc::clone(&self.cycle);
        tokio::spawn(async move {
            let _guard = guard;
            cycle.run().await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::aggregator::EventAggregator;
    use crate::pipeline::ingestion::test_support::*;
    use crate::pipeline::upstream::EventSource;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;

    fn scheduler_with(source: Arc<dyn EventSource>) -> Arc<FetchScheduler> {
        let cycle = FetchCycle::new(
            source,
            Arc::new(EventAggregator::new()),
            Arc::new(RecordingStore::default()),
        );
        Arc::new(FetchScheduler::new(Arc::new(cycle), Duration::from_secs(60)))
    }

    #[test]
    fn test_single_flight_guard() {
        let flight = Arc::new(SingleFlight::new());
        assert_eq!(flight.state(), FetchState::Idle);

        let guard = flight.try_begin().expect("idle flight must be acquirable");
        assert_eq!(flight.state(), FetchState::Fetching);
        assert!(flight.try_begin().is_none());

        drop(guard);
        assert_eq!(flight.state(), FetchState::Idle);
        assert!(flight.try_begin().is_some());
    }

    #[test]
    fn test_single_flight_across_threads() {
        let flight = Arc::new(SingleFlight::new());
        let won = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(std::sync::Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let flight = flight.clone();
                let won = won.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    if let Some(guard) = flight.try_begin() {
                        won.fetch_add(1, Ordering::SeqCst);
                        // Keep the flight until every contender has tried
                        std::thread::sleep(std::time::Duration::from_millis(50));
                        drop(guard);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(won.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ticks_during_slow_cycle_are_dropped() {
        let source = Arc::new(GatedSource::new(vec![event("PushEvent", "a")]));
        let scheduler = scheduler_with(source.clone());

        let handle = match scheduler.tick() {
            TickOutcome::Launched(h) => h,
            TickOutcome::Skipped => panic!("first tick must launch"),
        };
        source.started.notified().await;
        assert_eq!(scheduler.state(), FetchState::Fetching);

        // Second tick inside the same slow cycle
        assert!(matches!(scheduler.tick(), TickOutcome::Skipped));

        source.release.notify_one();
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.fetched, 1);

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.state(), FetchState::Idle);
    }

    #[tokio::test]
    async fn test_scheduler_is_repeatable() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(vec![event("PushEvent", "a")]),
            Ok(vec![event("PushEvent", "b")]),
        ]));
        let scheduler = scheduler_with(source.clone());

        for _ in 0..3 {
            match scheduler.tick() {
                TickOutcome::Launched(h) => {
                    h.await.unwrap().unwrap();
                }
                TickOutcome::Skipped => panic!("idle scheduler must launch"),
            }
        }

        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.cycle.aggregator().event_type_count("PushEvent"), 2);
    }

    #[tokio::test]
    async fn test_trigger_reports_outcomes() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(vec![event("PushEvent", "a"), event("ForkEvent", "b")]),
            Err(FetchError::Status(403)),
        ]));
        let scheduler = scheduler_with(source);

        match scheduler.trigger().await {
            TriggerOutcome::Completed(report) => assert_eq!(report.stored, 2),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(matches!(
            scheduler.trigger().await,
            TriggerOutcome::Failed(FetchError::Status(403))
        ));
        assert_eq!(scheduler.state(), FetchState::Idle);
    }

    #[tokio::test]
    async fn test_trigger_while_tick_cycle_runs() {
        let source = Arc::new(GatedSource::new(Vec::new()));
        let scheduler = scheduler_with(source.clone());

        let TickOutcome::Launched(handle) = scheduler.tick() else {
            panic!("first tick must launch");
        };
        source.started.notified().await;

        assert!(matches!(scheduler.trigger().await, TriggerOutcome::AlreadyRunning));

        source.release.notify_one();
        handle.await.unwrap().unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ticks_and_triggers_run_one_cycle() {
        const CONTENDERS: usize = 24;

        enum Attempt {
            Won(Option<JoinHandle<Result<CycleReport, FetchError>>>),
            Lost,
        }

        let source = Arc::new(GatedSource::new(vec![event("PushEvent", "a")]));
        let scheduler = scheduler_with(source.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let tasks: Vec<_> = (0..CONTENDERS)
            .map(|i| {
                let scheduler = scheduler.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let attempt = if i % 2 == 0 {
                        match scheduler.tick() {
                            TickOutcome::Launched(h) => Attempt::Won(Some(h)),
                            TickOutcome::Skipped => Attempt::Lost,
                        }
                    } else {
                        match scheduler.trigger().await {
                            TriggerOutcome::AlreadyRunning => Attempt::Lost,
                            TriggerOutcome::Completed(_) => Attempt::Won(None),
                            other => panic!("unexpected outcome: {:?}", other),
                        }
                    };
                    let _ = tx.send(attempt);
                })
            })
            .collect();
        drop(tx);

        // The gate keeps the winner in flight until every loser has reported
        let mut attempts = Vec::new();
        let mut lost = 0;
        while lost < CONTENDERS - 1 {
            let attempt = rx.recv().await.unwrap();
            if matches!(attempt, Attempt::Lost) {
                lost += 1;
            }
            attempts.push(attempt);
        }
        source.release.notify_one();

        for t in tasks {
            t.await.unwrap();
        }
        while let Some(a) = rx.recv().await {
            attempts.push(a);
        }

        let mut winners = 0;
        for attempt in attempts {
            if let Attempt::Won(handle) = attempt {
                winners += 1;
                if let Some(h) = handle {
                    h.await.unwrap().unwrap();
                }
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.peak.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.state(), FetchState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_on_interval() {
        let source = Arc::new(ScriptedSource::default());
        let scheduler = scheduler_with(source.clone());

        let task = tokio::spawn(scheduler.clone().run(true));

        // Ticks at 0s, 60s and 120s
        tokio::time::sleep(Duration::from_secs(150)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_without_immediate_fetch_waits_one_interval() {
        let source = Arc::new(ScriptedSource::default());
        let scheduler = scheduler_with(source.clone());

        let task = tokio::spawn(scheduler.clone().run(false));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(40)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_skips_ticks_while_cycle_overruns() {
        let source = Arc::new(GatedSource::new(Vec::new()));
        let scheduler = scheduler_with(source.clone());

        let task = tokio::spawn(scheduler.clone().run(true));

        // The first cycle hangs across three more ticks
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.state(), FetchState::Fetching);

        source.release.notify_one();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(scheduler.state(), FetchState::Idle);

        // Next tick (240s) starts a fresh cycle; nothing was queued
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        task.abort();
    }
}
