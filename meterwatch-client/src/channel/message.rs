//! Wire messages exchanged over the push channel.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::normalize::id_to_string;

/// Channel the dashboard subscribes to on every (re)connect.
pub const REALTIME_CHANNEL: &str = "realtime_updates";

/// Messages the client sends to the backend.
///
/// Serialized with an internal `type` tag:
/// `{"type":"subscribe","channels":["realtime_updates"]}` and `{"type":"ping"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { channels: Vec<String> },
    Ping,
}

/// Dispatch topic.
///
/// Lifecycle topics are raised by the manager itself. Everything else is the
/// `type` field of an inbound frame. A server frame whose `type` collides with
/// a lifecycle name (the backend greets with `{"type":"connected",...}`) is
/// dispatched as [`Topic::Other`]; register with `Topic::Other("connected")`
/// to receive it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Handshake sent, payload is `null`.
    Connected,
    /// Link lost or closed, payload is `{"reason": ...}`.
    Disconnected,
    /// Retry budget exhausted, payload is `{"attempts": n}`.
    ReconnectFailed,
    /// Telemetry pushed by the backend.
    RealtimeUpdate,
    /// Any other frame type.
    Other(String),
}

impl Topic {
    pub fn as_str(&self) -> &str {
        match self {
            Topic::Connected => "connected",
            Topic::Disconnected => "disconnected",
            Topic::ReconnectFailed => "reconnect_failed",
            Topic::RealtimeUpdate => "realtime_update",
            Topic::Other(name) => name,
        }
    }

    /// Topics only the manager may raise.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Topic::Connected | Topic::Disconnected | Topic::ReconnectFailed)
    }

    /// Topic for the `type` of an inbound frame.
    pub fn inbound(name: &str) -> Self {
        let topic = Topic::from(name);
        if topic.is_lifecycle() {
            Topic::Other(name.to_string())
        } else {
            topic
        }
    }
}

impl From<&str> for Topic {
    fn from(name: &str) -> Self {
        match name {
            "connected" => Topic::Connected,
            "disconnected" => Topic::Disconnected,
            "reconnect_failed" => Topic::ReconnectFailed,
            "realtime_update" => Topic::RealtimeUpdate,
            other => Topic::Other(other.to_string()),
        }
    }
}

impl From<String> for Topic {
    fn from(name: String) -> Self {
        Topic::from(name.as_str())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed inbound frame: its topic plus the full JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    pub topic: Topic,
    pub payload: Value,
}

/// Parse a text frame as `{"type": string, ...}`.
pub fn parse_frame(text: &str) -> Result<InboundFrame> {
    let payload: Value = serde_json::from_str(text)?;
    let topic = payload
        .get("type")
        .and_then(Value::as_str)
        .map(Topic::inbound)
        .ok_or_else(|| ClientError::Parse("frame has no string `type`".to_string()))?;
    Ok(InboundFrame { topic, payload })
}

/// Payload of a `realtime_update` frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeUpdate {
    pub building_id: Option<String>,
    pub data: Value,
}

impl RealtimeUpdate {
    /// Extract the update from a frame payload.
    ///
    /// When the frame has no `data` member the frame itself is treated as
    /// the telemetry body.
    pub fn from_payload(payload: &Value) -> Self {
        let building_id = payload.get("building_id").and_then(id_to_string);
        let data = payload
            .get("data")
            .filter(|d| d.is_object())
            .cloned()
            .unwrap_or_else(|| payload.clone());
        Self { building_id, data }
    }
}
