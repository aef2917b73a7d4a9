//! Presenter seam between the delivery subsystem and whatever renders it.

use std::sync::Arc;

use meterwatch_types::{ConnectionState, TelemetrySnapshot};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Receives normalized snapshots and connectivity changes.
///
/// Implementations must not block: they are called from the transport
/// tasks. Rendering belongs on the consumer side of a queue, see
/// [`ChannelPresenter`].
pub trait Presenter: Send + Sync {
    fn on_snapshot(&self, snapshot: TelemetrySnapshot);

    fn on_connectivity_change(&self, state: ConnectionState);
}

/// Event forwarded by [`ChannelPresenter`].
#[derive(Debug, Clone, PartialEq)]
pub enum PresenterEvent {
    Snapshot(TelemetrySnapshot),
    Connectivity(ConnectionState),
}

/// Presenter that queues every event for a single consumer loop.
#[derive(Debug, Clone)]
pub struct ChannelPresenter {
    tx: mpsc::UnboundedSender<PresenterEvent>,
}

impl ChannelPresenter {
    /// Create a presenter and the receiver its events arrive on.
    ///
    /// # Example
    ///
    /// ```rust
    /// use meterwatch_client::{ChannelPresenter, Presenter, PresenterEvent};
    /// use meterwatch_types::ConnectionState;
    ///
    /// let (presenter, mut rx) = ChannelPresenter::new();
    /// presenter.on_connectivity_change(ConnectionState::Connecting);
    /// assert_eq!(
    ///     rx.try_recv().unwrap(),
    ///     PresenterEvent::Connectivity(ConnectionState::Connecting)
    /// );
    /// ```
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PresenterEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn into_shared(self) -> Arc<dyn Presenter> {
        Arc::new(self)
    }
}

impl Presenter for ChannelPresenter {
    fn on_snapshot(&self, snapshot: TelemetrySnapshot) {
        // Receiver gone means the dashboard is shutting down.
        let _ = self.tx.send(PresenterEvent::Snapshot(snapshot));
    }

    fn on_connectivity_change(&self, state: ConnectionState) {
        let _ = self.tx.send(PresenterEvent::Connectivity(state));
    }
}

/// Presenter that keeps everything it receives, for inspection.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    snapshots: Mutex<Vec<TelemetrySnapshot>>,
    states: Mutex<Vec<ConnectionState>>,
}

impl RecordingPresenter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshots(&self) -> Vec<TelemetrySnapshot> {
        self.snapshots.lock().clone()
    }

    pub fn states(&self) -> Vec<ConnectionState> {
        self.states.lock().clone()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.lock().len()
    }
}

impl Presenter for RecordingPresenter {
    fn on_snapshot(&self, snapshot: TelemetrySnapshot) {
        self.snapshots.lock().push(snapshot);
    }

    fn on_connectivity_change(&self, state: ConnectionState) {
        self.states.lock().push(state);
    }
}
