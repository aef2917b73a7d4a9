//! Catalog records returned by the backend's building and analysis endpoints.

/// A metered apartment building.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Building {
    pub id: String,
    pub address: String,
    /// Federal address registry identifier.
    #[cfg_attr(feature = "serde", serde(default))]
    pub fias_id: Option<String>,
    /// City building registry number.
    #[cfg_attr(feature = "serde", serde(default))]
    pub unom_id: Option<String>,
    /// RFC 3339 creation time as reported by the backend.
    #[cfg_attr(feature = "serde", serde(default))]
    pub created_at: Option<String>,
}

/// Consumption analysis for a building over a period.
///
/// Only rendered by the dashboard; the classification itself happens
/// on the backend.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConsumptionAnalysis {
    pub building_id: String,
    pub period: String,
    pub total_cold_water: i64,
    pub total_hot_water: i64,
    pub difference: i64,
    pub difference_percent: f64,
    pub has_anomalies: bool,
    pub anomaly_count: u32,
    pub water_balance_status: String,
    pub temperature_status: String,
    pub pump_status: String,
    pub pump_operating_hours: i64,
    pub recommendations: Vec<String>,
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_building_without_registry_ids() {
        let json = r#"{"id":"7b0c","address":"Lenina 10","created_at":"2024-01-01T00:00:00Z"}"#;
        let building: Building = serde_json::from_str(json).unwrap();
        assert_eq!(building.id, "7b0c");
        assert!(building.fias_id.is_none());
        assert_eq!(building.created_at.as_deref(), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_deserialize_partial_analysis() {
        let json = r#"{
            "building_id": "7b0c",
            "period": "30 days",
            "total_cold_water": 1200,
            "total_hot_water": 800,
            "has_anomalies": true,
            "recommendations": ["check pump"]
        }"#;
        let analysis: ConsumptionAnalysis = serde_json::from_str(json).unwrap();
        assert!(analysis.has_anomalies);
        assert_eq!(analysis.total_cold_water, 1200);
        assert_eq!(analysis.anomaly_count, 0);
        assert_eq!(analysis.recommendations, vec!["check pump".to_string()]);
    }
}
