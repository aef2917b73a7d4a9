//! Fixed-cadence polling with single-flight fetches and synthetic fallback.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::SnapshotFetcher;
use crate::presenter::Presenter;
use crate::synthetic::synthetic_snapshot;
use crate::target::ActiveTarget;

/// Cadence for the view the user is looking at.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Cadence for lower-priority background views.
pub const BACKGROUND_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Counters describing what the scheduler has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Cycles that came due.
    pub cycles: u64,
    /// Cycles skipped because the previous fetch was still outstanding.
    pub skipped: u64,
    /// Fetches that failed and were replaced with synthetic data.
    pub failures: u64,
    /// Synthetic snapshots produced, for any reason.
    pub synthetic: u64,
    /// Results dropped because the scheduler was stopped or the target changed.
    pub discarded: u64,
}

#[derive(Debug, Default)]
struct Counters {
    cycles: AtomicU64,
    skipped: AtomicU64,
    failures: AtomicU64,
    synthetic: AtomicU64,
    discarded: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PollStats {
        PollStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            synthetic: self.synthetic.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// Marks a fetch as outstanding; clears the mark when dropped.
struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl InFlightGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag: flag.clone() })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Shared between the scheduler handle, its timer task and fetch tasks.
///
/// `in_flight` belongs to one generation: every start gets a fresh flag, so a
/// fetch left over from a stopped run cannot hold back the new one.
#[derive(Clone)]
struct CycleContext {
    fetcher: Arc<dyn SnapshotFetcher>,
    presenter: Arc<dyn Presenter>,
    generation: Arc<AtomicU64>,
    in_flight: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl CycleContext {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    fn run_cycle(&self, generation: u64, target: &ActiveTarget) {
        if !self.is_current(generation) {
            return;
        }
        Counters::bump(&self.counters.cycles);

        let Some(guard) = InFlightGuard::try_acquire(&self.in_flight) else {
            Counters::bump(&self.counters.skipped);
            tracing::debug!("Previous fetch still outstanding, skipping cycle");
            return;
        };

        let Some(building) = target.get() else {
            drop(guard);
            Counters::bump(&self.counters.synthetic);
            self.presenter.on_snapshot(synthetic_snapshot(None));
            return;
        };

        let ctx = self.clone();
        let target = target.clone();
        tokio::spawn(async move {
            let _guard = guard;
            let snapshot = match ctx.fetcher.fetch(&building).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!(%building, error = %e, "Telemetry fetch failed, using synthetic data");
                    Counters::bump(&ctx.counters.failures);
                    Counters::bump(&ctx.counters.synthetic);
                    synthetic_snapshot(Some(building.clone()))
                }
            };

            if !ctx.is_current(generation) || !target.matches(&building) {
                Counters::bump(&ctx.counters.discarded);
                tracing::debug!(%building, "Discarding result from superseded poll cycle");
                return;
            }
            ctx.presenter.on_snapshot(snapshot);
        });
    }
}

/// Pull-mode transport: fetches the active target on a fixed cadence.
///
/// At most one timer is live and each run has at most one fetch outstanding.
/// A cycle that comes due while that fetch is still running is skipped, not
/// queued.
/// Results that arrive after [`stop`](Self::stop), after a restart, or after
/// the target changed are discarded.
pub struct PollingScheduler {
    ctx: CycleContext,
    task: Option<JoinHandle<()>>,
    interval: Option<Duration>,
}

impl PollingScheduler {
    pub fn new(fetcher: Arc<dyn SnapshotFetcher>, presenter: Arc<dyn Presenter>) -> Self {
        Self {
            ctx: CycleContext {
                fetcher,
                presenter,
                generation: Arc::new(AtomicU64::new(0)),
                in_flight: Arc::new(AtomicBool::new(false)),
                counters: Arc::new(Counters::default()),
            },
            task: None,
            interval: None,
        }
    }

    /// Start polling `target` every `interval`, beginning immediately.
    ///
    /// Restarts the scheduler if it is already running.
    pub fn start(&mut self, target: ActiveTarget, interval: Duration) {
        self.stop();
        let generation = self.ctx.generation.load(Ordering::Acquire);
        self.ctx.in_flight = Arc::new(AtomicBool::new(false));
        let ctx = self.ctx.clone();
        let period = interval.max(Duration::from_millis(1));

        tracing::debug!(interval_ms = period.as_millis() as u64, "Polling started");
        self.interval = Some(period);
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                ctx.run_cycle(generation, &target);
            }
        }));
    }

    /// Cancel future cycles. An outstanding fetch finishes but is discarded.
    pub fn stop(&mut self) {
        self.ctx.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("Polling stopped");
        }
        self.interval = None;
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Interval of the running timer, if any.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn stats(&self) -> PollStats {
        self.ctx.counters.snapshot()
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for PollingScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingScheduler")
            .field("interval", &self.interval)
            .field("stats", &self.stats())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeFetcher;
    use super::*;
    use crate::presenter::RecordingPresenter;
    use meterwatch_types::{estimate_cold_return, SnapshotOrigin};

    fn scheduler(fetcher: FakeFetcher) -> (PollingScheduler, Arc<FakeFetcher>, Arc<RecordingPresenter>) {
        let fetcher = Arc::new(fetcher);
        let presenter = RecordingPresenter::new();
        let scheduler = PollingScheduler::new(fetcher.clone(), presenter.clone());
        (scheduler, fetcher, presenter)
    }

    #[tokio::test(start_paused = true)]
    async fn no_target_yields_synthetic_every_cycle() {
        let (mut scheduler, fetcher, presenter) = scheduler(FakeFetcher::default());

        scheduler.start(ActiveTarget::new(), Duration::from_secs(3));
        tokio::time::sleep(Duration::from_millis(9500)).await;

        let snapshots = presenter.snapshots();
        assert_eq!(snapshots.len(), 4);
        for snap in &snapshots {
            assert!(snap.is_synthetic());
            assert!(snap.building_id.is_none());
            assert!((50.0..100.0).contains(&snap.cold_supply_rate));
            assert_eq!(snap.cold_return_rate, estimate_cold_return(snap.cold_supply_rate));
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.stats().synthetic, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn first_fetch_is_immediate() {
        let (mut scheduler, _fetcher, presenter) = scheduler(FakeFetcher::default());

        scheduler.start(ActiveTarget::with_selected("b-1"), Duration::from_secs(3));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let snapshots = presenter.snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].origin, SnapshotOrigin::Poll);
        assert_eq!(snapshots[0].building_id.as_deref(), Some("b-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_skips_exactly_one_cycle() {
        let (mut scheduler, fetcher, presenter) =
            scheduler(FakeFetcher::with_delay(Duration::from_secs(5)));

        scheduler.start(ActiveTarget::with_selected("b-1"), Duration::from_secs(3));
        // Cycles at 0s, 3s (skipped) and 6s; the first fetch lands at 5s.
        tokio::time::sleep(Duration::from_millis(6500)).await;

        let stats = scheduler.stats();
        assert_eq!(stats.cycles, 3);
        assert_eq!(stats.skipped, 1);
        assert_eq!(presenter.snapshot_count(), 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(fetcher.max_concurrent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_falls_back_to_synthetic() {
        let (mut scheduler, _fetcher, presenter) = scheduler(FakeFetcher::failing());

        scheduler.start(ActiveTarget::with_selected("b-9"), Duration::from_secs(3));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let snapshots = presenter.snapshots();
        assert_eq!(snapshots.len(), 1);
        assert!(snapshots[0].is_synthetic());
        assert!(snapshots[0].estimated);
        assert_eq!(snapshots[0].building_id.as_deref(), Some("b-9"));
        assert_eq!(scheduler.stats().failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_discards_in_flight_result() {
        let (mut scheduler, fetcher, presenter) =
            scheduler(FakeFetcher::with_delay(Duration::from_secs(2)));

        scheduler.start(ActiveTarget::with_selected("b-1"), Duration::from_secs(3));
        tokio::time::sleep(Duration::from_secs(1)).await;
        scheduler.stop();
        assert!(!scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(presenter.snapshot_count(), 0);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.stats().discarded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_keeps_a_single_timer() {
        let (mut scheduler, _fetcher, presenter) = scheduler(FakeFetcher::default());
        let target = ActiveTarget::with_selected("b-1");

        scheduler.start(target.clone(), Duration::from_secs(3));
        scheduler.start(target.clone(), Duration::from_secs(3));
        scheduler.start(target, Duration::from_secs(3));
        assert_eq!(scheduler.interval(), Some(Duration::from_secs(3)));

        tokio::time::sleep(Duration::from_millis(9500)).await;
        assert_eq!(presenter.snapshot_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_does_not_wait_for_superseded_fetch() {
        let (mut scheduler, fetcher, presenter) =
            scheduler(FakeFetcher::with_delay(Duration::from_secs(2)));
        let target = ActiveTarget::with_selected("b-1");

        scheduler.start(target.clone(), Duration::from_secs(3));
        tokio::time::sleep(Duration::from_secs(1)).await;
        // The first fetch is still outstanding; the new run fetches at once.
        scheduler.start(target, Duration::from_secs(3));
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let stats = scheduler.stats();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.discarded, 1);
        assert_eq!(presenter.snapshot_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn target_change_drops_stale_result() {
        let (mut scheduler, _fetcher, presenter) =
            scheduler(FakeFetcher::with_delay(Duration::from_secs(2)));
        let target = ActiveTarget::with_selected("b-1");

        scheduler.start(target.clone(), Duration::from_secs(3));
        tokio::time::sleep(Duration::from_secs(1)).await;
        target.select("b-2");
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(presenter.snapshot_count(), 0);

        // The next cycle fetches the new target.
        tokio::time::sleep(Duration::from_secs(3)).await;
        let snapshots = presenter.snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].building_id.as_deref(), Some("b-2"));
    }
}
