use std::time::Instant;

use meterwatch_client::{ConsumptionAnalysis, TelemetrySnapshot};

/// Limits used to flag a reading.
///
/// Cold supply outside `[low_flow, high_flow]` is a warning. A return line
/// carrying more than the supply is critical.
#[derive(Debug, Clone)]
pub struct Thresholds {
    /// Supply below this, m³/h, is suspicious.
    pub low_flow: f64,
    /// Supply above this, m³/h, is suspicious.
    pub high_flow: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low_flow: 5.0,
            high_flow: 200.0,
        }
    }
}

/// Health status for a reading or an analysis field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "OK",
            HealthStatus::Warning => "WARN",
            HealthStatus::Critical => "CRIT",
        }
    }

    /// Map a backend status word (`water_balance_status`, `pump_status`, ...).
    pub fn from_status(status: &str) -> Self {
        match status {
            "" | "normal" | "ok" => HealthStatus::Healthy,
            "leak" | "error" | "critical" | "maintenance_required" => HealthStatus::Critical,
            _ => HealthStatus::Warning,
        }
    }
}

/// The latest snapshot with its computed health.
#[derive(Debug, Clone)]
pub struct Reading {
    pub snapshot: TelemetrySnapshot,
    pub health: HealthStatus,
    /// Local receive time, for the "updated N ago" indicator.
    pub received_at: Instant,
}

impl Reading {
    pub fn from_snapshot(snapshot: TelemetrySnapshot, thresholds: &Thresholds) -> Self {
        let health = classify(&snapshot, thresholds);
        Self {
            snapshot,
            health,
            received_at: Instant::now(),
        }
    }
}

fn classify(snapshot: &TelemetrySnapshot, thresholds: &Thresholds) -> HealthStatus {
    if snapshot.cold_balance() < 0.0 {
        return HealthStatus::Critical;
    }
    let supply = snapshot.cold_supply_rate;
    if supply < thresholds.low_flow || supply > thresholds.high_flow {
        return HealthStatus::Warning;
    }
    HealthStatus::Healthy
}

/// Worst status across an analysis report.
pub fn analysis_health(analysis: &ConsumptionAnalysis) -> HealthStatus {
    [
        HealthStatus::from_status(&analysis.water_balance_status),
        HealthStatus::from_status(&analysis.temperature_status),
        HealthStatus::from_status(&analysis.pump_status),
        if analysis.has_anomalies {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        },
    ]
    .into_iter()
    .max()
    .unwrap_or(HealthStatus::Healthy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(supply: f64, ret: Option<f64>) -> Reading {
        let snapshot = TelemetrySnapshot::builder()
            .cold_supply(supply)
            .cold_return_opt(ret)
            .observed_at_ms(1)
            .build();
        Reading::from_snapshot(snapshot, &Thresholds::default())
    }

    #[test]
    fn test_normal_flow_is_healthy() {
        assert_eq!(reading(84.0, None).health, HealthStatus::Healthy);
    }

    #[test]
    fn test_out_of_range_flow_warns() {
        assert_eq!(reading(2.0, None).health, HealthStatus::Warning);
        assert_eq!(reading(250.0, None).health, HealthStatus::Warning);
    }

    #[test]
    fn test_return_exceeding_supply_is_critical() {
        assert_eq!(reading(50.0, Some(60.0)).health, HealthStatus::Critical);
    }

    #[test]
    fn test_status_words() {
        assert_eq!(HealthStatus::from_status("normal"), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_status("maintenance_soon"), HealthStatus::Warning);
        assert_eq!(HealthStatus::from_status("leak"), HealthStatus::Critical);
        assert_eq!(HealthStatus::Critical.symbol(), "CRIT");
    }

    #[test]
    fn test_analysis_health_takes_worst() {
        let mut analysis = ConsumptionAnalysis {
            water_balance_status: "normal".into(),
            temperature_status: "normal".into(),
            pump_status: "normal".into(),
            ..ConsumptionAnalysis::default()
        };
        assert_eq!(analysis_health(&analysis), HealthStatus::Healthy);

        analysis.has_anomalies = true;
        assert_eq!(analysis_health(&analysis), HealthStatus::Warning);

        analysis.pump_status = "maintenance_required".into();
        assert_eq!(analysis_health(&analysis), HealthStatus::Critical);
    }
}
