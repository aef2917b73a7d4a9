//! Transport selection: push when the channel is up, polling otherwise.
//!
//! Both transports deliver through a [`DeliveryGate`] that only admits
//! snapshots from the active mode. Switching modes flips the gate before the
//! other transport is started or stopped, so a late poll result can never
//! land after push has taken over, and vice versa.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use meterwatch_types::{ConnectionState, SnapshotOrigin, TelemetrySnapshot};
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::api::SnapshotFetcher;
use crate::channel::{ChannelManager, HandlerId, RealtimeUpdate, Topic};
use crate::normalize::normalize;
use crate::poller::{PollStats, PollingScheduler, DEFAULT_POLL_INTERVAL};
use crate::presenter::Presenter;
use crate::target::ActiveTarget;

/// Default time allowed for the startup channel probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Which transport currently feeds the presenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryMode {
    Push,
    Poll,
}

impl DeliveryMode {
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryMode::Push => "push",
            DeliveryMode::Poll => "poll",
        }
    }
}

#[derive(Debug, Default)]
struct GateState {
    mode: Option<DeliveryMode>,
    /// Timestamp of the last measured snapshot delivered, in any mode.
    last_measured_ms: Option<u64>,
    /// Set on a mode switch; checked against the new mode's first measured
    /// snapshot and then cleared.
    handover_ms: Option<u64>,
}

/// Admits snapshots from the active mode only, and hands over between modes
/// without repeating an instant.
///
/// A snapshot is rejected when its mode is inactive. After a switch, the new
/// mode's first measured snapshot is also rejected if it is not newer than
/// the last measured snapshot the previous mode delivered. Within a mode
/// nothing is filtered, so a backend that repeats its timestamp still
/// updates the presenter every cycle. Synthetic snapshots carry the local
/// clock and are never compared.
pub struct DeliveryGate {
    state: Mutex<GateState>,
    presenter: Arc<dyn Presenter>,
    rejected: AtomicU64,
}

impl DeliveryGate {
    pub fn new(presenter: Arc<dyn Presenter>) -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            presenter,
            rejected: AtomicU64::new(0),
        }
    }

    /// Make `mode` the only admitted mode. Returns true if it changed.
    pub fn activate(&self, mode: DeliveryMode) -> bool {
        let mut state = self.state.lock();
        if state.mode == Some(mode) {
            return false;
        }
        tracing::info!(mode = mode.label(), "Delivery mode switched");
        state.mode = Some(mode);
        state.handover_ms = state.last_measured_ms;
        true
    }

    /// Admit nothing until the next activation.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.mode = None;
        state.handover_ms = None;
    }

    pub fn mode(&self) -> Option<DeliveryMode> {
        self.state.lock().mode
    }

    /// Snapshots rejected so far.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Forward `snapshot` to the presenter if the gate admits it.
    /// Returns true if delivered.
    pub fn deliver(&self, mode: DeliveryMode, snapshot: TelemetrySnapshot) -> bool {
        let mut state = self.state.lock();
        if state.mode != Some(mode) {
            tracing::debug!(mode = mode.label(), "Dropping snapshot from inactive transport");
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        if !snapshot.is_synthetic() {
            if let Some(handover) = state.handover_ms.take() {
                if snapshot.observed_at_ms <= handover {
                    tracing::debug!(
                        observed_at_ms = snapshot.observed_at_ms,
                        handover_ms = handover,
                        "Dropping snapshot already covered by the previous transport"
                    );
                    self.rejected.fetch_add(1, Ordering::Relaxed);
                    return false;
                }
            }
            state.last_measured_ms = Some(snapshot.observed_at_ms);
        }
        // Delivered under the lock so a mode switch cannot interleave.
        self.presenter.on_snapshot(snapshot);
        true
    }

    fn presenter(&self) -> &Arc<dyn Presenter> {
        &self.presenter
    }
}

/// Presenter adapter that routes one transport's snapshots through a gate.
struct GatedPresenter {
    gate: Arc<DeliveryGate>,
    mode: DeliveryMode,
}

impl Presenter for GatedPresenter {
    fn on_snapshot(&self, snapshot: TelemetrySnapshot) {
        self.gate.deliver(self.mode, snapshot);
    }

    fn on_connectivity_change(&self, state: ConnectionState) {
        self.gate.presenter().on_connectivity_change(state);
    }
}

/// Session settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub probe_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

struct Shared {
    channel: Option<ChannelManager>,
    target: ActiveTarget,
    gate: Arc<DeliveryGate>,
    poller: Mutex<PollingScheduler>,
    poll_interval: Mutex<Duration>,
}

impl Shared {
    /// Bring the transports in line with the channel's current state.
    fn reconcile(&self) {
        let mut poller = self.poller.lock();
        let connected = self.channel.as_ref().is_some_and(ChannelManager::is_connected);
        if connected {
            self.gate.activate(DeliveryMode::Push);
            if poller.is_running() {
                poller.stop();
            }
        } else {
            self.gate.activate(DeliveryMode::Poll);
            if !poller.is_running() {
                poller.start(self.target.clone(), *self.poll_interval.lock());
            }
        }
    }
}

/// One dashboard's telemetry feed.
///
/// Owns the push channel (if any), the polling scheduler and the delivery
/// gate, and switches between push and poll as the channel comes and goes.
pub struct TelemetrySession {
    shared: Arc<Shared>,
    config: SessionConfig,
    supervisor: Option<JoinHandle<()>>,
    handler: Option<HandlerId>,
}

impl TelemetrySession {
    /// Create a session. Pass `None` for `channel` to poll only.
    pub fn new(
        channel: Option<ChannelManager>,
        fetcher: Arc<dyn SnapshotFetcher>,
        target: ActiveTarget,
        presenter: Arc<dyn Presenter>,
        config: SessionConfig,
    ) -> Self {
        let gate = Arc::new(DeliveryGate::new(presenter));
        let poll_presenter: Arc<dyn Presenter> = Arc::new(GatedPresenter {
            gate: gate.clone(),
            mode: DeliveryMode::Poll,
        });

        Self {
            shared: Arc::new(Shared {
                channel,
                target,
                gate,
                poller: Mutex::new(PollingScheduler::new(fetcher, poll_presenter)),
                poll_interval: Mutex::new(config.poll_interval),
            }),
            config,
            supervisor: None,
            handler: None,
        }
    }

    /// Probe the channel and start the matching transport.
    ///
    /// Returns the mode chosen at startup.
    pub async fn start(&mut self) -> DeliveryMode {
        self.stop_supervision();

        let Some(channel) = self.shared.channel.clone() else {
            tracing::info!("Push channel disabled, polling only");
            self.shared.reconcile();
            return DeliveryMode::Poll;
        };

        self.handler = Some(self.register_push_handler(&channel));

        // Subscribe before probing so no transition is missed.
        let mut events = channel.state_events();
        let connected = channel.probe(self.config.probe_timeout).await;
        if !connected {
            tracing::warn!("Push channel unavailable, falling back to polling");
        }
        self.shared.reconcile();

        let shared = self.shared.clone();
        self.supervisor = Some(tokio::spawn(async move {
            loop {
                let state = match events.recv().await {
                    Ok(state) => state,
                    Err(RecvError::Lagged(missed)) => {
                        tracing::debug!(missed, "State events lagged");
                        match &shared.channel {
                            Some(channel) => channel.state(),
                            None => break,
                        }
                    }
                    Err(RecvError::Closed) => break,
                };
                shared.gate.presenter().on_connectivity_change(state);
                shared.reconcile();
            }
        }));

        self.mode().unwrap_or(DeliveryMode::Poll)
    }

    fn register_push_handler(&self, channel: &ChannelManager) -> HandlerId {
        let gate = self.shared.gate.clone();
        let target = self.shared.target.clone();
        channel.on(Topic::RealtimeUpdate, move |payload| {
            let update = RealtimeUpdate::from_payload(payload);
            if let (Some(building), true) = (&update.building_id, target.is_set()) {
                if !target.matches(building) {
                    tracing::trace!(%building, "Ignoring update for another building");
                    return Ok(());
                }
            }
            let mut snapshot = normalize(&update.data, SnapshotOrigin::Push)?;
            if snapshot.building_id.is_none() {
                snapshot.building_id = update.building_id.or_else(|| target.get());
            }
            gate.deliver(DeliveryMode::Push, snapshot);
            Ok(())
        })
    }

    /// Stop both transports and close the channel.
    pub fn stop(&mut self) {
        self.stop_supervision();
        self.shared.gate.close();
        self.shared.poller.lock().stop();
        if let Some(channel) = &self.shared.channel {
            channel.disconnect();
        }
    }

    fn stop_supervision(&mut self) {
        if let Some(task) = self.supervisor.take() {
            task.abort();
        }
        if let (Some(id), Some(channel)) = (self.handler.take(), &self.shared.channel) {
            channel.off(Topic::RealtimeUpdate, id);
        }
    }

    /// Change the polling cadence, restarting the timer if polling.
    pub fn set_poll_interval(&self, interval: Duration) {
        *self.shared.poll_interval.lock() = interval;
        let mut poller = self.shared.poller.lock();
        if poller.is_running() {
            poller.start(self.shared.target.clone(), interval);
        }
    }

    pub fn mode(&self) -> Option<DeliveryMode> {
        self.shared.gate.mode()
    }

    pub fn is_polling(&self) -> bool {
        self.shared.poller.lock().is_running()
    }

    pub fn poll_stats(&self) -> PollStats {
        self.shared.poller.lock().stats()
    }

    pub fn target(&self) -> &ActiveTarget {
        &self.shared.target
    }

    pub fn channel(&self) -> Option<&ChannelManager> {
        self.shared.channel.as_ref()
    }

    /// Snapshots the gate has turned away.
    pub fn rejected(&self) -> u64 {
        self.shared.gate.rejected()
    }
}

impl Drop for TelemetrySession {
    fn drop(&mut self) {
        if let Some(task) = self.supervisor.take() {
            task.abort();
        }
    }
}
