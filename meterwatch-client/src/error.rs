//! Error types for the telemetry client.

use thiserror::Error;

/// Errors that can occur while talking to the metering backend.
///
/// None of these are fatal to a dashboard: the channel recovers link loss by
/// reconnecting, and the poller replaces failed fetches with synthetic data.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Backend answered with a non-success status.
    #[error("API returned status {0}")]
    Status(u16),

    /// Failed to parse a response or frame.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Payload parsed but does not describe telemetry.
    #[error("Payload is not telemetry: {0}")]
    Normalize(String),

    /// Connection could not be established or was lost.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for the backend.
    #[error("Request timed out")]
    Timeout,

    /// Client configuration is unusable.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_connect() {
            ClientError::Connection(err.to_string())
        } else if err.is_decode() {
            ClientError::Parse(err.to_string())
        } else {
            ClientError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Parse(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::Connection(err.to_string())
    }
}

/// Result alias used throughout the client.
pub type Result<T> = std::result::Result<T, ClientError>;
