//! # meterwatch-types
//!
//! Core types for water-metering telemetry. This crate defines the shape that
//! every telemetry transport normalizes into before a snapshot reaches a
//! presenter, plus the connectivity state and the catalog records returned by
//! the backend.
//!
//! ## Design Goals
//!
//! - **Transport agnostic**: a [`TelemetrySnapshot`] looks the same whether it
//!   was pushed over a persistent channel, pulled by a poller or synthesized
//! - **Honest about provenance**: estimated and synthetic values are flagged,
//!   never presented as measured
//! - **Optional serialization**: enable the `serde` feature as needed
//!
//! ## Example
//!
//! ```rust
//! use meterwatch_types::{SnapshotOrigin, TelemetrySnapshot};
//!
//! let snapshot = TelemetrySnapshot::builder()
//!     .building("b-17")
//!     .cold_supply(72.0)
//!     .hot_channels([31.0, 14.5])
//!     .origin(SnapshotOrigin::Poll)
//!     .observed_at_ms(1_703_160_000_000)
//!     .build();
//!
//! // No cold return was supplied, so it is estimated from the supply.
//! assert!(snapshot.estimated);
//! assert_eq!(snapshot.cold_return_rate, 58.0);
//! ```

mod catalog;
mod connection;
mod snapshot;

pub use catalog::*;
pub use connection::*;
pub use snapshot::*;

/// Number of hot-water metering channels reported per building.
pub const HOT_CHANNELS: usize = 2;

/// Ratio applied to cold supply when the backend omits the cold return flow.
///
/// This is a placeholder heuristic carried over from the deployment, not a
/// physical model. Snapshots that use it carry `estimated = true`.
pub const COLD_RETURN_RATIO: f64 = 0.8;

/// Estimate cold-water return flow from supply flow.
///
/// Meters report whole units, so the estimate is rounded the same way.
pub fn estimate_cold_return(cold_supply: f64) -> f64 {
    (cold_supply * COLD_RETURN_RATIO).round()
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
