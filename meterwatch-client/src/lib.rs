//! # meterwatch-client
//!
//! Keeps a live telemetry display fed despite an unreliable link to the
//! metering backend.
//!
//! The pieces:
//!
//! - [`ChannelManager`]: one persistent WebSocket with a subscribe handshake,
//!   topic dispatch, heartbeat and bounded linear-backoff reconnection
//! - [`PollingScheduler`]: fixed-cadence fetches with single-flight cycles and
//!   synthetic fallback data
//! - [`TelemetrySession`]: probes the channel at startup and swaps between
//!   push and poll as connectivity changes, never delivering from both
//! - [`ApiClient`]: the backend's REST endpoints
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use meterwatch_client::{
//!     ActiveTarget, ApiClient, ChannelConfig, ChannelManager, ChannelPresenter, PresenterEvent,
//!     SessionConfig, TelemetrySession,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = ApiClient::builder().build()?;
//!     let target = ActiveTarget::new();
//!     target.select_default(&api.buildings().await?);
//!
//!     let (presenter, mut events) = ChannelPresenter::new();
//!     let channel = ChannelManager::spawn(ChannelConfig::default());
//!     let mut session = TelemetrySession::new(
//!         Some(channel),
//!         Arc::new(api),
//!         target,
//!         presenter.into_shared(),
//!         SessionConfig::default(),
//!     );
//!     session.start().await;
//!
//!     while let Some(event) = events.recv().await {
//!         if let PresenterEvent::Snapshot(snapshot) = event {
//!             println!("cold supply {:.1} m3/h", snapshot.cold_supply_rate);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod api;
mod backoff;
pub mod channel;
mod error;
mod normalize;
mod poller;
mod presenter;
mod session;
mod synthetic;
mod target;

pub use api::{ApiClient, ApiClientBuilder, SnapshotFetcher, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use backoff::{RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
pub use channel::{ChannelConfig, ChannelManager, Topic, WsConnector, DEFAULT_CHANNEL_URL, DEFAULT_HEARTBEAT};
pub use error::{ClientError, Result};
pub use normalize::{normalize, normalize_str};
pub use poller::{PollStats, PollingScheduler, BACKGROUND_POLL_INTERVAL, DEFAULT_POLL_INTERVAL};
pub use presenter::{ChannelPresenter, Presenter, PresenterEvent, RecordingPresenter};
pub use session::{DeliveryGate, DeliveryMode, SessionConfig, TelemetrySession, DEFAULT_PROBE_TIMEOUT};
pub use synthetic::synthetic_snapshot;
pub use target::ActiveTarget;

// Re-export types for convenience
pub use meterwatch_types::{
    Building, ConnectionState, ConsumptionAnalysis, SnapshotOrigin, TelemetrySnapshot,
    TemperatureReading,
};
