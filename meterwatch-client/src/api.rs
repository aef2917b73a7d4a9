//! HTTP client for the metering backend's REST API.
//!
//! ## Example
//!
//! ```rust,no_run
//! use meterwatch_client::ApiClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = ApiClient::builder()
//!         .base_url("http://localhost:8080/api")
//!         .build()?;
//!
//!     for building in api.buildings().await? {
//!         println!("{}: {}", building.id, building.address);
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use meterwatch_types::{Building, ConsumptionAnalysis, SnapshotOrigin, TelemetrySnapshot};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::normalize::normalize;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Something that can fetch one telemetry snapshot for a building.
///
/// The polling scheduler only depends on this seam.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch(&self, building_id: &str) -> Result<TelemetrySnapshot>;
}

/// Client for the catalog, analysis and realtime endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List all metered buildings.
    pub async fn buildings(&self) -> Result<Vec<Building>> {
        self.get_json("/buildings").await
    }

    /// Fetch a single building.
    pub async fn building(&self, id: &str) -> Result<Building> {
        self.get_json(&format!("/buildings/{}", encode_segment(id)))
            .await
    }

    /// Consumption analysis for the last `days` days.
    pub async fn analysis(&self, id: &str, days: u32) -> Result<ConsumptionAnalysis> {
        self.get_json(&format!("/analysis/{}?days={}", encode_segment(id), days))
            .await
    }

    /// Latest raw telemetry for a building, before normalization.
    pub async fn realtime(&self, id: &str) -> Result<Value> {
        self.get_json(&format!("/realtime/{}", encode_segment(id)))
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::trace!(%url, "GET");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status().as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }
}

#[async_trait]
impl SnapshotFetcher for ApiClient {
    async fn fetch(&self, building_id: &str) -> Result<TelemetrySnapshot> {
        let raw = self.realtime(building_id).await?;
        let mut snapshot = normalize(&raw, SnapshotOrigin::Poll)?;
        if snapshot.building_id.is_none() {
            snapshot.building_id = Some(building_id.to_string());
        }
        Ok(snapshot)
    }
}

/// Builder for [`ApiClient`].
#[derive(Debug, Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl ApiClientBuilder {
    /// Set the API root (default: `http://localhost:8080/api`).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ApiClient> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ClientError::Config(format!(
                "API base URL must be http(s): {base_url}"
            )));
        }

        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(ApiClient { client, base_url })
    }
}

// Building ids are UUIDs in practice; escape the few characters that
// would change the path.
fn encode_segment(s: &str) -> String {
    s.replace('%', "%25")
        .replace('/', "%2F")
        .replace('?', "%3F")
        .replace('#', "%23")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let api = ApiClient::builder().build().unwrap();
        assert_eq!(api.base_url(), "http://localhost:8080/api");
    }

    #[test]
    fn test_builder_trims_trailing_slash() {
        let api = ApiClient::builder()
            .base_url("https://meters.local/api/")
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        assert_eq!(api.base_url(), "https://meters.local/api");
    }

    #[test]
    fn test_builder_rejects_non_http_url() {
        let err = ApiClient::builder()
            .base_url("ws://localhost:8080")
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("7b0c-11"), "7b0c-11");
        assert_eq!(encode_segment("a/b?c#d"), "a%2Fb%3Fc%23d");
        assert_eq!(encode_segment("50%"), "50%25");
    }
}
