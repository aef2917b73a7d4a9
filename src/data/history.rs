//! Rolling flow history for sparklines and trends.

use std::collections::VecDeque;

use meterwatch_client::TelemetrySnapshot;

/// Maximum number of snapshots to keep.
const MAX_HISTORY_SIZE: usize = 60;

/// Tracks recent flow readings for the active building.
///
/// Cleared whenever the target changes so a trend never mixes buildings.
#[derive(Debug, Clone, Default)]
pub struct History {
    /// Cold-water supply rate, m³/h.
    pub cold_supply: VecDeque<f64>,
    /// Sum of the hot-water channels, m³/h.
    pub hot_total: VecDeque<f64>,
    /// Backend timestamps of the recorded snapshots.
    pub observed_at_ms: VecDeque<u64>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new snapshot
    pub fn record(&mut self, snapshot: &TelemetrySnapshot) {
        push_bounded(&mut self.cold_supply, snapshot.cold_supply_rate);
        push_bounded(&mut self.hot_total, snapshot.total_hot_rate());
        push_bounded(&mut self.observed_at_ms, snapshot.observed_at_ms);
    }

    pub fn clear(&mut self) {
        self.cold_supply.clear();
        self.hot_total.clear();
        self.observed_at_ms.clear();
    }

    pub fn len(&self) -> usize {
        self.cold_supply.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cold_supply.is_empty()
    }

    /// Sparkline bars for cold supply, scaled to 0..=100.
    ///
    /// Returns an empty Vec if there's not enough history.
    pub fn cold_sparkline(&self) -> Vec<u64> {
        scale_sparkline(&self.cold_supply)
    }

    /// Sparkline bars for total hot flow, scaled to 0..=100.
    pub fn hot_sparkline(&self) -> Vec<u64> {
        scale_sparkline(&self.hot_total)
    }

    /// Change in cold supply between the last two readings.
    pub fn cold_trend(&self) -> Option<f64> {
        let len = self.cold_supply.len();
        if len < 2 {
            return None;
        }
        Some(self.cold_supply[len - 1] - self.cold_supply[len - 2])
    }

    /// Mean cold supply over the retained window.
    pub fn cold_average(&self) -> Option<f64> {
        if self.cold_supply.is_empty() {
            return None;
        }
        Some(self.cold_supply.iter().sum::<f64>() / self.cold_supply.len() as f64)
    }
}

fn push_bounded<T>(values: &mut VecDeque<T>, value: T) {
    values.push_back(value);
    if values.len() > MAX_HISTORY_SIZE {
        values.pop_front();
    }
}

fn scale_sparkline(values: &VecDeque<f64>) -> Vec<u64> {
    if values.len() < 2 {
        return Vec::new();
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    values
        .iter()
        .map(|&v| {
            if range <= f64::EPSILON {
                50
            } else {
                ((v - min) / range * 100.0).round() as u64
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(cold: f64, hot: [f64; 2], ts: u64) -> TelemetrySnapshot {
        TelemetrySnapshot::builder()
            .building("b-1")
            .cold_supply(cold)
            .hot_channels(hot)
            .observed_at_ms(ts)
            .build()
    }

    #[test]
    fn test_record_and_trend() {
        let mut history = History::new();
        assert_eq!(history.cold_trend(), None);

        history.record(&snapshot(80.0, [30.0, 15.0], 1));
        history.record(&snapshot(86.0, [32.0, 14.0], 2));

        assert_eq!(history.len(), 2);
        assert_eq!(history.cold_trend(), Some(6.0));
        assert_eq!(history.cold_average(), Some(83.0));
        assert_eq!(history.hot_total, VecDeque::from(vec![45.0, 46.0]));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut history = History::new();
        for i in 0..(MAX_HISTORY_SIZE as u64 + 10) {
            history.record(&snapshot(i as f64, [0.0, 0.0], i));
        }
        assert_eq!(history.len(), MAX_HISTORY_SIZE);
        assert_eq!(history.observed_at_ms.front(), Some(&10));
    }

    #[test]
    fn test_sparkline_scaling() {
        let mut history = History::new();
        assert!(history.cold_sparkline().is_empty());

        for cold in [50.0, 75.0, 100.0] {
            history.record(&snapshot(cold, [0.0, 0.0], 0));
        }
        assert_eq!(history.cold_sparkline(), vec![0, 50, 100]);
        // Flat series sit mid-scale
        assert_eq!(history.hot_sparkline(), vec![50, 50, 50]);
    }

    #[test]
    fn test_clear() {
        let mut history = History::new();
        history.record(&snapshot(1.0, [0.0, 0.0], 0));
        history.clear();
        assert!(history.is_empty());
        assert!(history.observed_at_ms.is_empty());
    }
}
