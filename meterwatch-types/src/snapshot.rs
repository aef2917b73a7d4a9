//! TelemetrySnapshot - a point-in-time view of a building's water flows.

use crate::{current_timestamp_ms, estimate_cold_return, HOT_CHANNELS};

/// Where a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SnapshotOrigin {
    /// Pushed by the backend over the persistent channel.
    Push,
    /// Pulled from the backend by the polling scheduler.
    #[default]
    Poll,
    /// Generated locally because no measured data was available.
    Synthetic,
}

impl SnapshotOrigin {
    /// Short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            SnapshotOrigin::Push => "push",
            SnapshotOrigin::Poll => "poll",
            SnapshotOrigin::Synthetic => "synthetic",
        }
    }
}

/// Heating-loop temperatures reported alongside the flows.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TemperatureReading {
    /// Supply temperature, °C.
    pub supply: f64,
    /// Return temperature, °C.
    pub return_temp: f64,
    /// Supply minus return, °C.
    pub delta: f64,
}

impl TemperatureReading {
    /// Create a reading, deriving the delta from supply and return.
    pub fn new(supply: f64, return_temp: f64) -> Self {
        Self {
            supply,
            return_temp,
            delta: supply - return_temp,
        }
    }
}

/// Normalized telemetry for one building at one instant.
///
/// Every transport produces this shape, so presenters never need to know
/// which transport is active. All flow rates are non-negative, in m³/h.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TelemetrySnapshot {
    /// Building the readings belong to. `None` for synthetic data produced
    /// while no building is selected.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub building_id: Option<String>,

    /// Cold-water supply flow.
    pub cold_supply_rate: f64,

    /// Cold-water return flow. May be estimated, see [`Self::estimated`].
    pub cold_return_rate: f64,

    /// Hot-water flow per metering channel.
    pub hot_rates: [f64; HOT_CHANNELS],

    /// Heating-loop temperatures, when reported.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub temperature: Option<TemperatureReading>,

    /// Unix timestamp in milliseconds when the readings were taken.
    pub observed_at_ms: u64,

    /// True when `cold_return_rate` was derived from supply rather than measured.
    pub estimated: bool,

    /// How this snapshot reached the client.
    pub origin: SnapshotOrigin,
}

impl TelemetrySnapshot {
    /// Create a builder for constructing snapshots.
    pub fn builder() -> TelemetrySnapshotBuilder {
        TelemetrySnapshotBuilder::new()
    }

    /// Combined flow across all hot-water channels.
    pub fn total_hot_rate(&self) -> f64 {
        self.hot_rates.iter().sum()
    }

    /// Flow on a hot-water channel (1-based, as labelled on the meters).
    pub fn hot_channel(&self, channel: usize) -> Option<f64> {
        channel
            .checked_sub(1)
            .and_then(|idx| self.hot_rates.get(idx))
            .copied()
    }

    /// Whether the snapshot was produced locally instead of measured.
    pub fn is_synthetic(&self) -> bool {
        self.origin == SnapshotOrigin::Synthetic
    }

    /// Supply not accounted for by the return line.
    pub fn cold_balance(&self) -> f64 {
        self.cold_supply_rate - self.cold_return_rate
    }
}

/// Builder for constructing [`TelemetrySnapshot`] instances.
///
/// The builder applies the normalization rules: negative or non-finite flows
/// become zero, and a missing cold return is estimated and flagged.
#[derive(Debug, Default)]
pub struct TelemetrySnapshotBuilder {
    building_id: Option<String>,
    cold_supply: f64,
    cold_return: Option<f64>,
    hot_rates: [f64; HOT_CHANNELS],
    temperature: Option<TemperatureReading>,
    observed_at_ms: Option<u64>,
    origin: SnapshotOrigin,
}

impl TelemetrySnapshotBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the building the readings belong to.
    pub fn building(mut self, id: impl Into<String>) -> Self {
        self.building_id = Some(id.into());
        self
    }

    /// Set the building, if any.
    pub fn building_opt(mut self, id: Option<String>) -> Self {
        self.building_id = id;
        self
    }

    /// Set the cold-water supply flow.
    pub fn cold_supply(mut self, rate: f64) -> Self {
        self.cold_supply = rate;
        self
    }

    /// Set a measured cold-water return flow.
    pub fn cold_return(mut self, rate: f64) -> Self {
        self.cold_return = Some(rate);
        self
    }

    /// Set the measured cold-water return flow, if reported.
    pub fn cold_return_opt(mut self, rate: Option<f64>) -> Self {
        self.cold_return = rate;
        self
    }

    /// Set every hot-water channel at once.
    pub fn hot_channels(mut self, rates: [f64; HOT_CHANNELS]) -> Self {
        self.hot_rates = rates;
        self
    }

    /// Set a single hot-water channel (1-based). Out-of-range channels are ignored.
    pub fn hot_channel(mut self, channel: usize, rate: f64) -> Self {
        if let Some(slot) = channel.checked_sub(1).and_then(|i| self.hot_rates.get_mut(i)) {
            *slot = rate;
        }
        self
    }

    /// Attach a temperature reading.
    pub fn temperature(mut self, reading: TemperatureReading) -> Self {
        self.temperature = Some(reading);
        self
    }

    /// Attach a temperature reading, if any.
    pub fn temperature_opt(mut self, reading: Option<TemperatureReading>) -> Self {
        self.temperature = reading;
        self
    }

    /// Set a specific observation time (milliseconds since Unix epoch).
    pub fn observed_at_ms(mut self, ts: u64) -> Self {
        self.observed_at_ms = Some(ts);
        self
    }

    /// Set the snapshot origin.
    pub fn origin(mut self, origin: SnapshotOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Build the snapshot.
    pub fn build(self) -> TelemetrySnapshot {
        let cold_supply_rate = non_negative(self.cold_supply);
        let (cold_return_rate, estimated) = match self.cold_return {
            Some(rate) => (non_negative(rate), false),
            None => (estimate_cold_return(cold_supply_rate), true),
        };

        TelemetrySnapshot {
            building_id: self.building_id,
            cold_supply_rate,
            cold_return_rate,
            hot_rates: self.hot_rates.map(non_negative),
            temperature: self.temperature,
            observed_at_ms: self.observed_at_ms.unwrap_or_else(current_timestamp_ms),
            estimated,
            origin: self.origin,
        }
    }
}

fn non_negative(rate: f64) -> f64 {
    if rate.is_finite() && rate > 0.0 {
        rate
    } else {
        0.0
    }
}
