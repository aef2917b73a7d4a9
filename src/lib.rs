// Library crate: public API items may not be used by the binary
#![allow(unused)]

//! # meterwatch
//!
//! A terminal dashboard for live water-metering telemetry.
//!
//! Delivery itself lives in `meterwatch-client`: a [`TelemetrySession`]
//! prefers the backend's push channel and falls back to polling whenever the
//! channel is down. This crate renders whatever the session delivers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Application                          │
//! │  ┌──────────┐    ┌──────────┐    ┌─────────┐    ┌─────────┐ │
//! │  │   app    │───▶│   data   │───▶│   ui    │───▶│Terminal │ │
//! │  │ (state)  │    │ (health) │    │(render) │    │         │ │
//! │  └────▲─────┘    └──────────┘    └─────────┘    └─────────┘ │
//! │       │ PresenterEvent                                       │
//! │  ┌────┴─────────────┐                                        │
//! │  │ TelemetrySession │◀── push channel | polling scheduler   │
//! │  └──────────────────┘                                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`app`]**: Application state, view navigation and analysis requests
//! - **[`config`]**: Layered settings (defaults, TOML file, environment, flags)
//! - **[`data`]**: Health classification, flow history for sparklines, interval parsing
//! - **[`ui`]**: Terminal rendering using ratatui
//! - **[`headless`]**: JSON-lines output when no terminal UI is wanted
//! - **[`logging`]**: tracing subscriber setup
//!
//! ## Usage
//!
//! ```bash
//! # Dashboard against a local backend
//! meterwatch --api-url http://localhost:8080/api --ws-url ws://localhost:8080/ws
//!
//! # Poll only, one line of JSON per reading
//! meterwatch --no-push --headless --building b-1
//! ```
//!
//! ### As a library
//!
//! ```
//! use meterwatch::App;
//! use meterwatch_client::{ActiveTarget, ChannelPresenter};
//!
//! let (_presenter, events) = ChannelPresenter::new();
//! let mut app = App::new(events, ActiveTarget::new(), "http://localhost:8080/api");
//! assert_eq!(app.drain_events(), 0);
//! ```

pub mod app;
pub mod config;
pub mod data;
pub mod events;
pub mod headless;
pub mod logging;
pub mod ui;

pub use app::{AnalysisState, App, Request, View};
pub use config::{Overrides, Settings};
pub use data::{HealthStatus, History, Reading, Thresholds};
pub use meterwatch_client::TelemetrySession;
