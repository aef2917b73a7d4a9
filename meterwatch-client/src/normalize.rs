//! Payload normalization into [`TelemetrySnapshot`].
//!
//! The backend reports telemetry in two shapes. The structured form nests
//! readings per meter group:
//!
//! ```json
//! {"building_id": "b-1",
//!  "cold_water": {"total_flow_rate": 80},
//!  "hot_water": {"flow_rate_ch1": 30, "flow_rate_ch2": 12},
//!  "temperature": {"supply_temp": 67, "return_temp": 44},
//!  "timestamp": "2024-01-15T10:30:00Z"}
//! ```
//!
//! Older producers send flat fields (`coldWaterIn`, `coldWaterOut`,
//! `hotWaterCh1`, `hotWaterCh2`). Both are accepted; when a reading exists in
//! both forms the structured one wins.

use chrono::DateTime;
use meterwatch_types::{SnapshotOrigin, TelemetrySnapshot, TemperatureReading};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ClientError, Result};

#[derive(Debug, Default, Deserialize)]
struct RawTelemetry {
    #[serde(default)]
    building_id: Option<Value>,
    #[serde(default)]
    cold_water: Option<RawColdWater>,
    #[serde(default)]
    hot_water: Option<RawHotWater>,
    #[serde(default)]
    temperature: Option<RawTemperature>,
    #[serde(default)]
    timestamp: Option<String>,

    #[serde(default, rename = "coldWaterIn")]
    cold_water_in: Option<f64>,
    #[serde(default, rename = "coldWaterOut")]
    cold_water_out: Option<f64>,
    #[serde(default, rename = "hotWaterCh1")]
    hot_water_ch1: Option<f64>,
    #[serde(default, rename = "hotWaterCh2")]
    hot_water_ch2: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawColdWater {
    #[serde(default)]
    total_flow_rate: Option<f64>,
    #[serde(default)]
    return_flow_rate: Option<f64>,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawHotWater {
    #[serde(default)]
    flow_rate_ch1: Option<f64>,
    #[serde(default)]
    flow_rate_ch2: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTemperature {
    #[serde(default)]
    supply_temp: Option<f64>,
    #[serde(default)]
    return_temp: Option<f64>,
}

/// Normalize a decoded JSON payload into a snapshot.
///
/// Fails with [`ClientError::Normalize`] when the payload is not an object
/// or carries no cold-water supply reading in either form.
pub fn normalize(value: &Value, origin: SnapshotOrigin) -> Result<TelemetrySnapshot> {
    if !value.is_object() {
        return Err(ClientError::Normalize("expected a JSON object".to_string()));
    }
    let raw: RawTelemetry = serde_json::from_value(value.clone())
        .map_err(|e| ClientError::Normalize(e.to_string()))?;

    let cold = raw.cold_water.unwrap_or_default();
    let hot = raw.hot_water.unwrap_or_default();

    let cold_supply = cold
        .total_flow_rate
        .or(raw.cold_water_in)
        .ok_or_else(|| ClientError::Normalize("missing cold-water supply".to_string()))?;
    let cold_return = cold.return_flow_rate.or(raw.cold_water_out);
    let hot_rates = [
        hot.flow_rate_ch1.or(raw.hot_water_ch1).unwrap_or(0.0),
        hot.flow_rate_ch2.or(raw.hot_water_ch2).unwrap_or(0.0),
    ];

    // A zero supply temperature means the backend had no reading.
    let temperature = raw.temperature.and_then(|t| match (t.supply_temp, t.return_temp) {
        (Some(supply), Some(ret)) if supply != 0.0 => Some(TemperatureReading::new(supply, ret)),
        _ => None,
    });

    let observed_at = raw
        .timestamp
        .as_deref()
        .and_then(parse_timestamp_ms)
        .or_else(|| cold.timestamp.as_deref().and_then(parse_timestamp_ms));

    let mut builder = TelemetrySnapshot::builder()
        .building_opt(raw.building_id.as_ref().and_then(id_to_string))
        .cold_supply(cold_supply)
        .cold_return_opt(cold_return)
        .hot_channels(hot_rates)
        .temperature_opt(temperature)
        .origin(origin);
    if let Some(ts) = observed_at {
        builder = builder.observed_at_ms(ts);
    }
    Ok(builder.build())
}

/// Parse a raw frame or response body and normalize it.
pub fn normalize_str(body: &str, origin: SnapshotOrigin) -> Result<TelemetrySnapshot> {
    let value: Value = serde_json::from_str(body)?;
    normalize(&value, origin)
}

/// Building ids arrive as strings or numbers depending on the producer.
pub(crate) fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_timestamp_ms(raw: &str) -> Option<u64> {
    let parsed = DateTime::parse_from_rfc3339(raw).ok()?;
    u64::try_from(parsed.timestamp_millis()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn structured_payload() {
        let value = json!({
            "building_id": "b-1",
            "cold_water": {"total_flow_rate": 80, "timestamp": "2024-01-15T10:29:00Z"},
            "hot_water": {"flow_rate_ch1": 30, "flow_rate_ch2": 12},
            "temperature": {"supply_temp": 67, "return_temp": 44, "delta_temp": 23},
            "timestamp": "2024-01-15T10:30:00Z",
            "update_id": 1705314600
        });

        let snap = normalize(&value, SnapshotOrigin::Poll).unwrap();
        assert_eq!(snap.building_id.as_deref(), Some("b-1"));
        assert_eq!(snap.cold_supply_rate, 80.0);
        assert_eq!(snap.cold_return_rate, 64.0);
        assert!(snap.estimated);
        assert_eq!(snap.hot_rates, [30.0, 12.0]);
        let temp = snap.temperature.unwrap();
        assert_eq!(temp.delta, 23.0);
        assert_eq!(snap.observed_at_ms, 1_705_314_600_000);
        assert_eq!(snap.origin, SnapshotOrigin::Poll);
    }

    #[test]
    fn legacy_flat_payload() {
        let value = json!({
            "coldWaterIn": 55.5,
            "coldWaterOut": 40.0,
            "hotWaterCh1": 22.0,
            "hotWaterCh2": 14.0
        });

        let snap = normalize(&value, SnapshotOrigin::Push).unwrap();
        assert_eq!(snap.cold_supply_rate, 55.5);
        assert_eq!(snap.cold_return_rate, 40.0);
        assert!(!snap.estimated);
        assert_eq!(snap.hot_rates, [22.0, 14.0]);
        assert!(snap.temperature.is_none());
        assert!(snap.building_id.is_none());
    }

    #[test]
    fn structured_form_wins_over_legacy() {
        let value = json!({
            "cold_water": {"total_flow_rate": 90},
            "coldWaterIn": 10,
            "hot_water": {"flow_rate_ch1": 31},
            "hotWaterCh1": 5,
            "hotWaterCh2": 7
        });

        let snap = normalize(&value, SnapshotOrigin::Poll).unwrap();
        assert_eq!(snap.cold_supply_rate, 90.0);
        assert_eq!(snap.hot_rates, [31.0, 7.0]);
    }

    #[test]
    fn missing_supply_is_rejected() {
        let err = normalize(&json!({"hot_water": {"flow_rate_ch1": 3}}), SnapshotOrigin::Poll)
            .unwrap_err();
        assert!(matches!(err, ClientError::Normalize(_)));

        let err = normalize(&json!([1, 2, 3]), SnapshotOrigin::Poll).unwrap_err();
        assert!(matches!(err, ClientError::Normalize(_)));
    }

    #[test]
    fn wrongly_typed_field_is_rejected() {
        let err = normalize(&json!({"coldWaterIn": "lots"}), SnapshotOrigin::Poll).unwrap_err();
        assert!(matches!(err, ClientError::Normalize(_)));
    }

    #[test]
    fn numeric_building_id_and_bad_timestamp() {
        let value = json!({
            "building_id": 42,
            "coldWaterIn": 60,
            "timestamp": "yesterday"
        });
        let before = meterwatch_types::current_timestamp_ms();
        let snap = normalize(&value, SnapshotOrigin::Push).unwrap();
        assert_eq!(snap.building_id.as_deref(), Some("42"));
        assert!(snap.observed_at_ms >= before);
    }

    #[test]
    fn zero_supply_temperature_means_no_reading() {
        let value = json!({
            "coldWaterIn": 60,
            "temperature": {"supply_temp": 0, "return_temp": 0, "delta_temp": 0}
        });
        let snap = normalize(&value, SnapshotOrigin::Poll).unwrap();
        assert!(snap.temperature.is_none());
    }

    #[test]
    fn normalize_str_reports_parse_errors() {
        let err = normalize_str("{not json", SnapshotOrigin::Poll).unwrap_err();
        assert!(matches!(err, ClientError::Parse(_)));
    }
}
