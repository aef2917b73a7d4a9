//! Synthetic readings shown when no measured data is available.

use meterwatch_types::{SnapshotOrigin, TelemetrySnapshot, TemperatureReading};
use rand::Rng;

/// Produce a bounded random snapshot, marked [`SnapshotOrigin::Synthetic`].
///
/// Cold supply falls in [50, 100), hot channel 1 in [20, 50) and hot channel
/// 2 in [10, 30). The cold return is always estimated from supply.
pub fn synthetic_snapshot(building_id: Option<String>) -> TelemetrySnapshot {
    let mut rng = rand::thread_rng();
    let supply_temp = rng.gen_range(65.0..70.0);
    let return_temp = rng.gen_range(42.0..46.0);

    TelemetrySnapshot::builder()
        .building_opt(building_id)
        .cold_supply(rng.gen_range(50.0..100.0))
        .hot_channels([rng.gen_range(20.0..50.0), rng.gen_range(10.0..30.0)])
        .temperature(TemperatureReading::new(supply_temp, return_temp))
        .origin(SnapshotOrigin::Synthetic)
        .build()
}
