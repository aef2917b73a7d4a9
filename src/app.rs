//! Application state and navigation logic.

use std::time::{Duration, Instant};

use meterwatch_client::{
    ActiveTarget, Building, ConnectionState, ConsumptionAnalysis, DeliveryMode, PollStats,
    PresenterEvent, TelemetrySnapshot,
};
use tokio::sync::mpsc;

use crate::data::{History, Reading, Thresholds};
use crate::ui::Theme;

/// How long a status message stays visible.
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);

/// The current view/tab in the TUI.
///
/// The consumption analysis is shown as an overlay (controlled by
/// `App::show_analysis`) rather than as a separate view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Live flows for the active building.
    Telemetry,
    /// The building catalog, for choosing the active building.
    Buildings,
}

impl View {
    /// Cycle to the next view.
    pub fn next(self) -> Self {
        match self {
            View::Telemetry => View::Buildings,
            View::Buildings => View::Telemetry,
        }
    }

    /// Returns the display label for this view.
    pub fn label(&self) -> &'static str {
        match self {
            View::Telemetry => "Telemetry",
            View::Buildings => "Buildings",
        }
    }
}

/// Work the app needs done off the render loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    LoadAnalysis { building_id: String, days: u32 },
}

/// Progress of the analysis overlay.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisState {
    Loading,
    Ready(ConsumptionAnalysis),
    Failed(String),
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub current_view: View,
    pub show_help: bool,
    pub show_analysis: bool,

    // Delivery
    events: mpsc::UnboundedReceiver<PresenterEvent>,
    pub target: ActiveTarget,
    pub reading: Option<Reading>,
    pub history: History,
    pub thresholds: Thresholds,
    /// `None` when push delivery is disabled.
    pub connection: Option<ConnectionState>,
    pub delivery: Option<DeliveryMode>,
    pub poll_stats: PollStats,

    // Catalog
    pub buildings: Vec<Building>,
    pub catalog_error: Option<String>,
    pub selected_index: usize,

    // Analysis overlay
    pub analysis: Option<AnalysisState>,
    pub analysis_days: u32,
    requests: Vec<Request>,

    // UI
    pub theme: Theme,
    pub source: String,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create an app fed by the presenter's event queue.
    pub fn new(
        events: mpsc::UnboundedReceiver<PresenterEvent>,
        target: ActiveTarget,
        source: impl Into<String>,
    ) -> Self {
        Self {
            running: true,
            current_view: View::Telemetry,
            show_help: false,
            show_analysis: false,
            events,
            target,
            reading: None,
            history: History::new(),
            thresholds: Thresholds::default(),
            connection: None,
            delivery: None,
            poll_stats: PollStats::default(),
            buildings: Vec::new(),
            catalog_error: None,
            selected_index: 0,
            analysis: None,
            analysis_days: 30,
            requests: Vec::new(),
            theme: Theme::dark(),
            source: source.into(),
            status_message: None,
        }
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn with_analysis_days(mut self, days: u32) -> Self {
        self.analysis_days = days;
        self
    }

    /// Install the catalog, or the reason it could not be loaded.
    ///
    /// The selection cursor starts on the active building when there is one.
    pub fn set_catalog(&mut self, catalog: Result<Vec<Building>, String>) {
        match catalog {
            Ok(buildings) => {
                self.buildings = buildings;
                self.catalog_error = None;
            }
            Err(err) => {
                self.buildings.clear();
                self.catalog_error = Some(err);
            }
        }
        self.selected_index = self
            .target
            .get()
            .and_then(|id| self.buildings.iter().position(|b| b.id == id))
            .unwrap_or(0);
    }

    /// Mark push delivery as enabled, starting from `state`.
    pub fn set_connection(&mut self, state: ConnectionState) {
        self.connection = Some(state);
    }

    /// Refresh the transport indicators from the session.
    pub fn set_delivery(&mut self, mode: Option<DeliveryMode>, stats: PollStats) {
        self.delivery = mode;
        self.poll_stats = stats;
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired.
    pub fn get_status_message(&self) -> Option<&str> {
        match &self.status_message {
            Some((msg, time)) if time.elapsed() < STATUS_MESSAGE_TTL => Some(msg),
            _ => None,
        }
    }

    /// Apply every queued presenter event.
    ///
    /// Returns the number of events applied.
    pub fn drain_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            self.apply_event(event);
            applied += 1;
        }
        applied
    }

    fn apply_event(&mut self, event: PresenterEvent) {
        match event {
            PresenterEvent::Snapshot(snapshot) => self.apply_snapshot(snapshot),
            PresenterEvent::Connectivity(state) => {
                if state.is_terminal() {
                    self.set_status_message("Push channel gave up, polling only".to_string());
                } else if self.connection.is_some_and(|prev| prev != state) {
                    self.set_status_message(format!("Channel {}", state));
                }
                self.connection = Some(state);
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: TelemetrySnapshot) {
        // Anything queued before a target switch belongs to the old building
        if let Some(id) = snapshot.building_id.as_deref() {
            if self.target.is_set() && !self.target.matches(id) {
                return;
            }
        }
        self.history.record(&snapshot);
        self.reading = Some(Reading::from_snapshot(snapshot, &self.thresholds));
    }

    /// The catalog entry for the active building, if it is in the catalog.
    pub fn target_building(&self) -> Option<&Building> {
        let id = self.target.get()?;
        self.buildings.iter().find(|b| b.id == id)
    }

    pub fn selected_building(&self) -> Option<&Building> {
        self.buildings.get(self.selected_index)
    }

    /// Switch to the next view.
    pub fn next_view(&mut self) {
        self.current_view = self.current_view.next();
    }

    /// Switch to a specific view.
    pub fn set_view(&mut self, view: View) {
        self.current_view = view;
    }

    /// Move selection down by n items.
    pub fn select_next_n(&mut self, n: usize) {
        let max = self.buildings.len().saturating_sub(1);
        self.selected_index = (self.selected_index + n).min(max);
    }

    /// Move selection up by n items.
    pub fn select_prev_n(&mut self, n: usize) {
        self.selected_index = self.selected_index.saturating_sub(n);
    }

    pub fn select_next(&mut self) {
        self.select_next_n(1);
    }

    pub fn select_prev(&mut self) {
        self.select_prev_n(1);
    }

    pub fn select_first(&mut self) {
        self.selected_index = 0;
    }

    pub fn select_last(&mut self) {
        self.selected_index = self.buildings.len().saturating_sub(1);
    }

    /// Make the highlighted building the active target.
    ///
    /// Returns true if the target changed. The previous building's reading,
    /// history and analysis are dropped.
    pub fn activate_selected(&mut self) -> bool {
        let Some(building) = self.selected_building() else {
            return false;
        };
        let id = building.id.clone();
        let address = building.address.clone();

        self.current_view = View::Telemetry;
        if !self.target.select(id) {
            return false;
        }

        self.reading = None;
        self.history.clear();
        self.analysis = None;
        self.show_analysis = false;
        self.set_status_message(format!("Watching {}", address));
        true
    }

    /// Open the analysis overlay for the active building, queueing a load.
    pub fn open_analysis(&mut self) {
        let Some(building_id) = self.target.get() else {
            self.set_status_message("Select a building first".to_string());
            return;
        };
        self.show_analysis = true;
        self.analysis = Some(AnalysisState::Loading);
        self.requests.push(Request::LoadAnalysis {
            building_id,
            days: self.analysis_days,
        });
    }

    /// Take the queued requests.
    pub fn take_requests(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.requests)
    }

    /// Store a finished analysis load.
    ///
    /// Results for a building that is no longer active are dropped.
    pub fn apply_analysis(
        &mut self,
        building_id: &str,
        result: Result<ConsumptionAnalysis, String>,
    ) {
        if !self.target.matches(building_id) {
            return;
        }
        self.analysis = Some(match result {
            Ok(analysis) => AnalysisState::Ready(analysis),
            Err(err) => AnalysisState::Failed(err),
        });
    }

    /// Navigate back: close overlays first, then return to Telemetry.
    pub fn go_back(&mut self) {
        if self.show_analysis {
            self.show_analysis = false;
            return;
        }
        self.current_view = View::Telemetry;
    }

    /// Toggle the help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Signal the application to quit.
    pub fn quit(&mut self) {
        self.running = false;
    }
}

#[cfg(test)]
mod tests {
    use meterwatch_client::SnapshotOrigin;

    use super::*;

    fn building(id: &str, address: &str) -> Building {
        Building {
            id: id.to_string(),
            address: address.to_string(),
            ..Building::default()
        }
    }

    fn snapshot(id: Option<&str>, cold: f64, ts: u64) -> TelemetrySnapshot {
        TelemetrySnapshot::builder()
            .building_opt(id.map(str::to_string))
            .cold_supply(cold)
            .observed_at_ms(ts)
            .origin(SnapshotOrigin::Poll)
            .build()
    }

    fn app_with_catalog() -> (App, mpsc::UnboundedSender<PresenterEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut app = App::new(rx, ActiveTarget::with_selected("b-1"), "test");
        app.set_catalog(Ok(vec![
            building("b-1", "Lenina 10"),
            building("b-2", "Mira 5"),
            building("b-3", "Tverskaya 1"),
        ]));
        (app, tx)
    }

    #[test]
    fn test_drain_applies_snapshots_and_states() {
        let (mut app, tx) = app_with_catalog();
        app.set_connection(ConnectionState::Connecting);

        tx.send(PresenterEvent::Connectivity(ConnectionState::Connected)).unwrap();
        tx.send(PresenterEvent::Snapshot(snapshot(Some("b-1"), 80.0, 1))).unwrap();
        tx.send(PresenterEvent::Snapshot(snapshot(Some("b-1"), 90.0, 2))).unwrap();

        assert_eq!(app.drain_events(), 3);
        assert_eq!(app.connection, Some(ConnectionState::Connected));
        assert_eq!(app.get_status_message(), Some("Channel connected"));
        assert_eq!(app.reading.as_ref().unwrap().snapshot.cold_supply_rate, 90.0);
        assert_eq!(app.history.len(), 2);
        assert_eq!(app.drain_events(), 0);
    }

    #[test]
    fn test_failed_channel_reports_polling_only() {
        let (mut app, tx) = app_with_catalog();
        tx.send(PresenterEvent::Connectivity(ConnectionState::Failed)).unwrap();
        app.drain_events();

        assert_eq!(app.connection, Some(ConnectionState::Failed));
        assert_eq!(app.get_status_message(), Some("Push channel gave up, polling only"));
    }

    #[test]
    fn test_snapshot_for_other_building_is_dropped() {
        let (mut app, tx) = app_with_catalog();
        tx.send(PresenterEvent::Snapshot(snapshot(Some("b-2"), 80.0, 1))).unwrap();
        tx.send(PresenterEvent::Snapshot(snapshot(None, 70.0, 2))).unwrap();
        app.drain_events();

        assert_eq!(app.history.len(), 1);
        assert!(app.reading.as_ref().unwrap().snapshot.building_id.is_none());
    }

    #[test]
    fn test_catalog_cursor_starts_on_target() {
        let (tx, rx) = mpsc::unbounded_channel::<PresenterEvent>();
        drop(tx);
        let mut app = App::new(rx, ActiveTarget::with_selected("b-2"), "test");
        app.set_catalog(Ok(vec![building("b-1", "a"), building("b-2", "b")]));
        assert_eq!(app.selected_index, 1);
        assert_eq!(app.target_building().map(|b| b.address.as_str()), Some("b"));
    }

    #[test]
    fn test_catalog_failure_keeps_running() {
        let (mut app, _tx) = app_with_catalog();
        app.set_catalog(Err("connection refused".to_string()));
        assert!(app.buildings.is_empty());
        assert_eq!(app.catalog_error.as_deref(), Some("connection refused"));
        assert_eq!(app.selected_index, 0);
        assert!(!app.activate_selected());
    }

    #[test]
    fn test_navigation_clamps() {
        let (mut app, _tx) = app_with_catalog();
        app.select_prev();
        assert_eq!(app.selected_index, 0);
        app.select_next_n(10);
        assert_eq!(app.selected_index, 2);
        app.select_first();
        assert_eq!(app.selected_index, 0);
        app.select_last();
        assert_eq!(app.selected_index, 2);
    }

    #[test]
    fn test_activate_switches_target_and_resets_display() {
        let (mut app, tx) = app_with_catalog();
        tx.send(PresenterEvent::Snapshot(snapshot(Some("b-1"), 80.0, 1))).unwrap();
        app.drain_events();
        app.set_view(View::Buildings);

        app.select_next();
        assert!(app.activate_selected());

        assert_eq!(app.target.get().as_deref(), Some("b-2"));
        assert_eq!(app.current_view, View::Telemetry);
        assert!(app.reading.is_none());
        assert!(app.history.is_empty());
        assert_eq!(app.get_status_message(), Some("Watching Mira 5"));

        // Re-selecting the same building changes nothing
        app.set_view(View::Buildings);
        assert!(!app.activate_selected());
    }

    #[test]
    fn test_analysis_request_and_result() {
        let (app, _tx) = app_with_catalog();
        let mut app = app.with_analysis_days(7);
        app.open_analysis();

        assert!(app.show_analysis);
        assert_eq!(app.analysis, Some(AnalysisState::Loading));
        assert_eq!(
            app.take_requests(),
            vec![Request::LoadAnalysis {
                building_id: "b-1".to_string(),
                days: 7
            }]
        );
        assert!(app.take_requests().is_empty());

        app.apply_analysis("b-2", Err("stale".to_string()));
        assert_eq!(app.analysis, Some(AnalysisState::Loading));

        app.apply_analysis("b-1", Ok(ConsumptionAnalysis::default()));
        assert!(matches!(app.analysis, Some(AnalysisState::Ready(_))));

        app.go_back();
        assert!(!app.show_analysis);
    }

    #[test]
    fn test_analysis_needs_target() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let mut app = App::new(rx, ActiveTarget::new(), "test");
        app.open_analysis();
        assert!(!app.show_analysis);
        assert!(app.take_requests().is_empty());
        assert_eq!(app.get_status_message(), Some("Select a building first"));
    }

    #[test]
    fn test_view_cycle() {
        let (mut app, _tx) = app_with_catalog();
        app.next_view();
        assert_eq!(app.current_view, View::Buildings);
        app.go_back();
        assert_eq!(app.current_view, View::Telemetry);
        assert_eq!(View::Buildings.next(), View::Telemetry);
    }
}
