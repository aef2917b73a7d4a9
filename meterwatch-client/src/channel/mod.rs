//! Persistent push channel with topic dispatch and bounded reconnection.
//!
//! [`ChannelManager`] is a cheap, cloneable handle. All connection state lives
//! in a single background task that processes commands, transport events and
//! timers one at a time, so no two of them ever interleave.
//!
//! Every open attempt is tagged with an epoch. `disconnect()` and every new
//! attempt bump the epoch, and an attempt that resolves under an old epoch is
//! closed and ignored. A late reconnect therefore cannot revive a channel the
//! caller has shut down.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use meterwatch_client::{ChannelConfig, ChannelManager};
//!
//! # async fn run() {
//! let channel = ChannelManager::spawn(ChannelConfig::new("ws://localhost:8080/ws"));
//! channel.on("realtime_update", |payload| {
//!     println!("update: {payload}");
//!     Ok(())
//! });
//!
//! if channel.probe(Duration::from_secs(2)).await {
//!     println!("push channel is live");
//! }
//! # }
//! ```

mod message;
mod registry;
mod transport;

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use meterwatch_types::ConnectionState;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Interval, MissedTickBehavior, Sleep};

pub use message::{parse_frame, ClientMessage, InboundFrame, RealtimeUpdate, Topic, REALTIME_CHANNEL};
pub use registry::{HandlerError, HandlerId, HandlerRegistry, HandlerResult};
pub use transport::{Connector, Inbound, Link, Outbound, RemoteEnd, WsConnector, DEFAULT_CONNECT_TIMEOUT};

#[cfg(test)]
pub(crate) use transport::testing;

use crate::backoff::{RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
use crate::error::ClientError;

/// Default heartbeat period while connected.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(30);

/// Default WebSocket endpoint.
pub const DEFAULT_CHANNEL_URL: &str = "ws://localhost:8080/ws";

const STATE_EVENT_CAPACITY: usize = 64;

/// Channel manager settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    pub url: String,
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub heartbeat: Duration,
    /// Server-pushed channels requested in the subscribe handshake.
    pub channels: Vec<String>,
}

impl ChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_CHANNEL_URL.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            heartbeat: DEFAULT_HEARTBEAT,
            channels: vec![REALTIME_CHANNEL.to_string()],
        }
    }
}

enum Command {
    Connect {
        outcome: Option<oneshot::Sender<bool>>,
    },
    Disconnect,
    Send(String),
}

struct AttemptResult {
    epoch: u64,
    result: Result<Link, ClientError>,
}

/// Handle to the push channel.
#[derive(Clone)]
pub struct ChannelManager {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    transitions: broadcast::Sender<ConnectionState>,
    registry: Arc<HandlerRegistry>,
}

impl ChannelManager {
    /// Spawn a manager that connects over WebSocket to `config.url`.
    ///
    /// Must be called within a tokio runtime. Nothing is opened until
    /// [`connect`](Self::connect) or [`probe`](Self::probe).
    pub fn spawn(config: ChannelConfig) -> Self {
        let connector = WsConnector::new(config.url.clone());
        Self::with_connector(config, connector)
    }

    /// Spawn a manager over a custom transport.
    pub fn with_connector<C: Connector>(config: ChannelConfig, connector: C) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (attempt_tx, attempt_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let (transitions, _) = broadcast::channel(STATE_EVENT_CAPACITY);
        let registry = Arc::new(HandlerRegistry::new());

        let actor = ChannelActor {
            policy: RetryPolicy::new(config.max_attempts, config.base_delay),
            config,
            connector: Arc::new(connector),
            registry: registry.clone(),
            state_tx,
            transitions: transitions.clone(),
            current: ConnectionState::Disconnected,
            epoch: 0,
            link: None,
            retry_timer: None,
            heartbeat: None,
            waiters: Vec::new(),
            attempt_tx,
        };
        tokio::spawn(actor.run(command_rx, attempt_rx));

        Self {
            commands,
            state,
            transitions,
            registry,
        }
    }

    /// Open the channel. A no-op while connecting, connected or reconnecting.
    ///
    /// From `Disconnected` or `Failed` this restores the full retry budget.
    pub fn connect(&self) {
        let _ = self.commands.send(Command::Connect { outcome: None });
    }

    /// Connect and wait up to `timeout` for the attempt to succeed.
    ///
    /// Returns true if the channel is connected. A timed-out attempt keeps
    /// running in the background and follows the normal retry procedure.
    pub async fn probe(&self, timeout: Duration) -> bool {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Connect { outcome: Some(tx) }).is_err() {
            return false;
        }
        matches!(tokio::time::timeout(timeout, rx).await, Ok(Ok(true)))
    }

    /// Close the channel with the normal-closure code. No reconnection follows.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    /// Serialize and send `message` if connected.
    ///
    /// Returns false, with a warning, when the channel is not connected.
    pub fn send<M: Serialize>(&self, message: &M) -> bool {
        if !self.is_connected() {
            tracing::warn!(state = %self.state(), "Dropping outbound message, channel not connected");
            return false;
        }
        match serde_json::to_string(message) {
            Ok(text) => self.commands.send(Command::Send(text)).is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize outbound message");
                false
            }
        }
    }

    /// Register a handler for a topic. Handlers run in registration order.
    pub fn on<F>(&self, topic: impl Into<Topic>, handler: F) -> HandlerId
    where
        F: Fn(&Value) -> HandlerResult + Send + Sync + 'static,
    {
        self.registry.register(topic.into(), handler)
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn off(&self, topic: impl Into<Topic>, id: HandlerId) -> bool {
        self.registry.remove(&topic.into(), id)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Subscribe to every subsequent state transition.
    pub fn state_events(&self) -> broadcast::Receiver<ConnectionState> {
        self.transitions.subscribe()
    }
}

impl std::fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelManager")
            .field("state", &self.state())
            .field("registry", &self.registry)
            .finish()
    }
}

struct ChannelActor {
    config: ChannelConfig,
    connector: Arc<dyn Connector>,
    registry: Arc<HandlerRegistry>,
    state_tx: watch::Sender<ConnectionState>,
    transitions: broadcast::Sender<ConnectionState>,
    current: ConnectionState,
    policy: RetryPolicy,
    epoch: u64,
    link: Option<Link>,
    retry_timer: Option<Pin<Box<Sleep>>>,
    heartbeat: Option<Interval>,
    waiters: Vec<oneshot::Sender<bool>>,
    attempt_tx: mpsc::UnboundedSender<AttemptResult>,
}

impl ChannelActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut attempts: mpsc::UnboundedReceiver<AttemptResult>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(attempt) = attempts.recv() => self.handle_attempt(attempt),
                event = next_inbound(&mut self.link) => self.handle_inbound(event),
                _ = wait_for(&mut self.retry_timer) => self.handle_retry_due(),
                _ = next_tick(&mut self.heartbeat) => self.send_heartbeat(),
            }
        }

        // Every handle is gone.
        if let Some(link) = self.link.take() {
            let _ = link.outbound.send(Outbound::Close);
        }
        tracing::debug!("Channel task exiting");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { outcome } => self.handle_connect(outcome),
            Command::Disconnect => self.handle_disconnect(),
            Command::Send(text) => self.transmit(text),
        }
    }

    fn handle_connect(&mut self, outcome: Option<oneshot::Sender<bool>>) {
        match self.current {
            ConnectionState::Connected => {
                if let Some(tx) = outcome {
                    let _ = tx.send(true);
                }
            }
            ConnectionState::Connecting | ConnectionState::Reconnecting => {
                tracing::debug!(state = %self.current, "Connect ignored, attempt in progress");
                self.waiters.extend(outcome);
            }
            ConnectionState::Disconnected | ConnectionState::Failed => {
                self.retry_timer = None;
                self.policy.reset();
                self.waiters.extend(outcome);
                self.start_attempt(ConnectionState::Connecting);
            }
        }
    }

    fn handle_disconnect(&mut self) {
        self.epoch += 1;
        let had_timer = self.retry_timer.take().is_some();
        self.heartbeat = None;
        self.resolve_waiters(false);

        let had_link = match self.link.take() {
            Some(link) => {
                let _ = link.outbound.send(Outbound::Close);
                true
            }
            None => false,
        };

        if had_link || had_timer || self.current != ConnectionState::Disconnected {
            tracing::info!("Channel closed by caller");
            self.set_state(ConnectionState::Disconnected);
            self.registry
                .dispatch(&Topic::Disconnected, &json!({ "reason": "manual" }));
        }
    }

    fn start_attempt(&mut self, state: ConnectionState) {
        self.epoch += 1;
        self.set_state(state);

        let epoch = self.epoch;
        let connector = self.connector.clone();
        let results = self.attempt_tx.clone();
        tokio::spawn(async move {
            let result = connector.open().await;
            let _ = results.send(AttemptResult { epoch, result });
        });
    }

    fn handle_attempt(&mut self, attempt: AttemptResult) {
        if attempt.epoch != self.epoch || !self.current.is_pending() {
            tracing::debug!(epoch = attempt.epoch, current = self.epoch, "Discarding stale connection attempt");
            if let Ok(link) = attempt.result {
                let _ = link.outbound.send(Outbound::Close);
            }
            return;
        }

        match attempt.result {
            Ok(link) => self.on_opened(link),
            Err(e) => {
                tracing::warn!(error = %e, attempt = self.policy.attempt(), "Channel connection attempt failed");
                self.resolve_waiters(false);
                self.on_link_lost(e.to_string());
            }
        }
    }

    fn on_opened(&mut self, link: Link) {
        let handshake = ClientMessage::Subscribe {
            channels: self.config.channels.clone(),
        };
        match serde_json::to_string(&handshake) {
            Ok(text) => {
                let _ = link.outbound.send(Outbound::Text(text));
            }
            Err(e) => tracing::warn!(error = %e, "Failed to encode subscribe handshake"),
        }

        self.link = Some(link);
        self.policy.reset();
        self.heartbeat = Some(heartbeat_interval(self.config.heartbeat));
        tracing::info!(url = %self.config.url, "Channel connected");
        self.set_state(ConnectionState::Connected);
        self.registry.dispatch(&Topic::Connected, &Value::Null);
        self.resolve_waiters(true);
    }

    fn handle_inbound(&mut self, event: Option<Inbound>) {
        match event {
            Some(Inbound::Text(text)) => match parse_frame(&text) {
                Ok(frame) => {
                    self.registry.dispatch(&frame.topic, &frame.payload);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping unparseable frame");
                }
            },
            Some(Inbound::Closed(reason)) => {
                tracing::info!(%reason, "Channel closed by remote");
                self.on_link_lost(reason);
            }
            None => self.on_link_lost("transport ended".to_string()),
        }
    }

    /// Involuntary loss of the link or a failed attempt.
    fn on_link_lost(&mut self, reason: String) {
        self.link = None;
        self.heartbeat = None;
        self.set_state(ConnectionState::Disconnected);
        self.registry
            .dispatch(&Topic::Disconnected, &json!({ "reason": reason }));
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        match self.policy.next_delay() {
            Some(delay) => {
                tracing::info!(
                    attempt = self.policy.attempt(),
                    max = self.policy.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnect"
                );
                self.retry_timer = Some(Box::pin(tokio::time::sleep(delay)));
            }
            None => {
                let attempts = self.policy.attempt();
                tracing::warn!(attempts, "Reconnect budget exhausted");
                self.set_state(ConnectionState::Failed);
                self.registry
                    .dispatch(&Topic::ReconnectFailed, &json!({ "attempts": attempts }));
            }
        }
    }

    fn handle_retry_due(&mut self) {
        self.retry_timer = None;
        if self.current == ConnectionState::Disconnected {
            self.start_attempt(ConnectionState::Reconnecting);
        }
    }

    fn send_heartbeat(&mut self) {
        match serde_json::to_string(&ClientMessage::Ping) {
            Ok(text) => self.transmit(text),
            Err(e) => tracing::warn!(error = %e, "Failed to encode ping"),
        }
    }

    fn transmit(&mut self, text: String) {
        match (&self.link, self.current) {
            (Some(link), ConnectionState::Connected) => {
                // A dead link surfaces through the inbound side.
                let _ = link.outbound.send(Outbound::Text(text));
            }
            _ => tracing::warn!(state = %self.current, "Dropping outbound message, channel not connected"),
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.current == state {
            return;
        }
        tracing::debug!(from = %self.current, to = %state, "Channel state change");
        self.current = state;
        self.state_tx.send_replace(state);
        let _ = self.transitions.send(state);
    }

    fn resolve_waiters(&mut self, connected: bool) {
        for tx in self.waiters.drain(..) {
            let _ = tx.send(connected);
        }
    }
}

fn heartbeat_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_inbound(link: &mut Option<Link>) -> Option<Inbound> {
    match link {
        Some(link) => link.inbound.recv().await,
        None => pending().await,
    }
}

async fn wait_for(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Script, ScriptedConnector};
    use super::*;
    use parking_lot::Mutex;

    fn fast_config() -> ChannelConfig {
        ChannelConfig {
            url: "ws://test/ws".to_string(),
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            heartbeat: Duration::from_secs(30),
            channels: vec![REALTIME_CHANNEL.to_string()],
        }
    }

    async fn wait_for_state(events: &mut broadcast::Receiver<ConnectionState>, target: ConnectionState) {
        let found = tokio::time::timeout(Duration::from_secs(600), async {
            loop {
                match events.recv().await {
                    Ok(state) if state == target => break,
                    Ok(_) => continue,
                    Err(e) => panic!("state stream ended: {e}"),
                }
            }
        })
        .await;
        assert!(found.is_ok(), "never reached {target}");
    }

    fn recorder(channel: &ChannelManager, topic: &str) -> Arc<Mutex<Vec<Value>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        channel.on(topic, move |payload| {
            sink.lock().push(payload.clone());
            Ok(())
        });
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn connect_sends_subscribe_handshake() {
        let (connector, mut script) = ScriptedConnector::always(Script::Accept);
        let channel = ChannelManager::with_connector(fast_config(), connector);
        let connected = recorder(&channel, "connected");

        assert!(channel.probe(Duration::from_secs(1)).await);
        assert!(channel.is_connected());
        assert_eq!(*connected.lock(), vec![Value::Null]);

        let mut remote = script.next_remote().await;
        let Some(Outbound::Text(first)) = remote.recv().await else {
            panic!("expected handshake");
        };
        let first: Value = serde_json::from_str(&first).unwrap();
        assert_eq!(first, json!({"type": "subscribe", "channels": ["realtime_updates"]}));
    }

    #[tokio::test(start_paused = true)]
    async fn server_greeting_does_not_raise_connected() {
        let (connector, mut script) = ScriptedConnector::always(Script::Accept);
        let channel = ChannelManager::with_connector(fast_config(), connector);
        let connected = recorder(&channel, "connected");
        let greetings = Arc::new(Mutex::new(Vec::new()));
        let sink = greetings.clone();
        channel.on(Topic::Other("connected".to_string()), move |payload| {
            sink.lock().push(payload.clone());
            Ok(())
        });

        assert!(channel.probe(Duration::from_secs(1)).await);
        let remote = script.next_remote().await;
        remote.push(r#"{"type":"connected","message":"welcome"}"#);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(*connected.lock(), vec![Value::Null]);
        assert_eq!(greetings.lock().len(), 1);
        assert_eq!(greetings.lock()[0]["message"], "welcome");
    }

    #[tokio::test(start_paused = true)]
    async fn connect_is_idempotent_while_pending() {
        let (connector, script) =
            ScriptedConnector::always(Script::AcceptAfter(Duration::from_millis(500)));
        let channel = ChannelManager::with_connector(fast_config(), connector);
        let mut events = channel.state_events();

        channel.connect();
        channel.connect();
        channel.connect();
        wait_for_state(&mut events, ConnectionState::Connected).await;
        channel.connect();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(script.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_fails_with_linear_backoff() {
        let (connector, script) = ScriptedConnector::always(Script::Refuse);
        let channel = ChannelManager::with_connector(fast_config(), connector);
        let failed = recorder(&channel, "reconnect_failed");
        let mut events = channel.state_events();

        channel.connect();
        wait_for_state(&mut events, ConnectionState::Failed).await;

        // Initial attempt plus three retries.
        let opens = script.opens.lock().clone();
        assert_eq!(opens.len(), 4);
        let gaps: Vec<u128> = opens.windows(2).map(|w| (w[1] - w[0]).as_millis()).collect();
        assert_eq!(gaps, vec![100, 200, 300]);
        assert_eq!(*failed.lock(), vec![json!({"attempts": 3})]);

        // No further automatic attempts.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(script.open_count(), 4);
        assert_eq!(channel.state(), ConnectionState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_pass_through_reconnecting() {
        let (connector, _script) =
            ScriptedConnector::new([Script::Refuse, Script::Refuse], Script::Accept);
        let channel = ChannelManager::with_connector(fast_config(), connector);
        let mut events = channel.state_events();

        channel.connect();
        let mut seen = Vec::new();
        loop {
            let state = events.recv().await.unwrap();
            seen.push(state);
            if state == ConnectionState::Connected {
                break;
            }
        }

        use ConnectionState::*;
        assert_eq!(
            seen,
            vec![Connecting, Disconnected, Reconnecting, Disconnected, Reconnecting, Connected]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn manual_connect_after_failure_restores_budget() {
        let (connector, script) =
            ScriptedConnector::new([Script::Refuse; 4], Script::Accept);
        let channel = ChannelManager::with_connector(fast_config(), connector);
        let mut events = channel.state_events();

        channel.connect();
        wait_for_state(&mut events, ConnectionState::Failed).await;

        assert!(channel.probe(Duration::from_secs(1)).await);
        assert_eq!(script.open_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_close_triggers_reconnect() {
        let (connector, mut script) = ScriptedConnector::always(Script::Accept);
        let channel = ChannelManager::with_connector(fast_config(), connector);
        let disconnected = recorder(&channel, "disconnected");
        let mut events = channel.state_events();

        assert!(channel.probe(Duration::from_secs(1)).await);
        let remote = script.next_remote().await;
        remote.close("server restart");

        wait_for_state(&mut events, ConnectionState::Reconnecting).await;
        wait_for_state(&mut events, ConnectionState::Connected).await;

        assert_eq!(*disconnected.lock(), vec![json!({"reason": "server restart"})]);
        assert_eq!(script.open_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_disconnect_suppresses_reconnect() {
        let (connector, mut script) = ScriptedConnector::always(Script::Accept);
        let channel = ChannelManager::with_connector(fast_config(), connector);
        let disconnected = recorder(&channel, "disconnected");

        assert!(channel.probe(Duration::from_secs(1)).await);
        let mut remote = script.next_remote().await;
        let _handshake = remote.recv().await;

        channel.disconnect();
        assert_eq!(remote.recv().await, Some(Outbound::Close));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert_eq!(script.open_count(), 1);
        assert_eq!(*disconnected.lock(), vec![json!({"reason": "manual"})]);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_attempt_after_disconnect_is_discarded() {
        let (connector, mut script) =
            ScriptedConnector::always(Script::AcceptAfter(Duration::from_secs(1)));
        let channel = ChannelManager::with_connector(fast_config(), connector);
        let connected = recorder(&channel, "connected");

        channel.connect();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(channel.state(), ConnectionState::Connecting);
        channel.disconnect();

        // The attempt completes after the disconnect and is closed again.
        let mut remote = script.next_remote().await;
        assert_eq!(remote.recv().await, Some(Outbound::Close));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert!(connected.lock().is_empty());
        assert_eq!(script.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_frames_dispatch_by_type() {
        let (connector, mut script) = ScriptedConnector::always(Script::Accept);
        let channel = ChannelManager::with_connector(fast_config(), connector);
        let updates = recorder(&channel, "realtime_update");
        channel.on("realtime_update", |_| panic!("bad handler"));
        let after_panic = recorder(&channel, "realtime_update");

        assert!(channel.probe(Duration::from_secs(1)).await);
        let remote = script.next_remote().await;
        remote.push("not json at all");
        remote.push(r#"{"no_type": true}"#);
        remote.push(r#"{"type":"realtime_update","building_id":"b-1","data":{"coldWaterIn":5}}"#);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(updates.lock().len(), 1);
        assert_eq!(after_panic.lock().len(), 1);
        assert_eq!(updates.lock()[0]["building_id"], "b-1");
        assert!(channel.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn off_stops_delivery() {
        let (connector, mut script) = ScriptedConnector::always(Script::Accept);
        let channel = ChannelManager::with_connector(fast_config(), connector);
        let seen = Arc::new(Mutex::new(0));
        let counter = seen.clone();
        let id = channel.on("alert", move |_| {
            *counter.lock() += 1;
            Ok(())
        });

        assert!(channel.probe(Duration::from_secs(1)).await);
        let remote = script.next_remote().await;
        remote.push(r#"{"type":"alert"}"#);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(channel.off("alert", id));
        remote.push(r#"{"type":"alert"}"#);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(*seen.lock(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_pings_while_connected() {
        let (connector, mut script) = ScriptedConnector::always(Script::Accept);
        let channel = ChannelManager::with_connector(fast_config(), connector);

        assert!(channel.probe(Duration::from_secs(1)).await);
        let mut remote = script.next_remote().await;
        let _handshake = remote.recv().await;

        tokio::time::sleep(Duration::from_secs(31)).await;
        let Some(Outbound::Text(ping)) = remote.recv().await else {
            panic!("expected ping");
        };
        assert_eq!(serde_json::from_str::<Value>(&ping).unwrap(), json!({"type": "ping"}));
    }

    #[tokio::test(start_paused = true)]
    async fn send_requires_connection() {
        let (connector, mut script) = ScriptedConnector::always(Script::Accept);
        let channel = ChannelManager::with_connector(fast_config(), connector);

        assert!(!channel.send(&ClientMessage::Ping));

        assert!(channel.probe(Duration::from_secs(1)).await);
        let mut remote = script.next_remote().await;
        let _handshake = remote.recv().await;

        assert!(channel.send(&json!({"type": "hello"})));
        assert_eq!(
            remote.recv().await,
            Some(Outbound::Text(r#"{"type":"hello"}"#.to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn probe_times_out_on_slow_open() {
        let (connector, _script) =
            ScriptedConnector::always(Script::AcceptAfter(Duration::from_secs(10)));
        let channel = ChannelManager::with_connector(fast_config(), connector);

        assert!(!channel.probe(Duration::from_secs(2)).await);
        assert_eq!(channel.state(), ConnectionState::Connecting);

        // The attempt keeps going and eventually connects.
        let mut events = channel.state_events();
        wait_for_state(&mut events, ConnectionState::Connected).await;
    }
}
