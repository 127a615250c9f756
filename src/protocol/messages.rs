//! Outbound telemetry message
//!
//! One message is built per publish tick and serialized to JSON right before
//! it is handed to the MQTT client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Periodic counter message published by the bridge
///
/// # Examples
/// ```
/// use telemetry_bridge::protocol::TelemetryMessage;
///
/// let message = TelemetryMessage::new(3, "test-1");
/// assert_eq!(message.message, "Automatic message #3");
/// assert_eq!(message.source, "test-1");
///
/// let json = message.to_json().unwrap();
/// assert!(json.contains("\"source\":\"test-1\""));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryMessage {
    /// Human-readable text carrying the publish counter
    pub message: String,
    /// Creation time, serialized as RFC 3339 (ISO-8601)
    pub timestamp: DateTime<Utc>,
    /// Client identifier of the publishing bridge
    pub source: String,
}

impl TelemetryMessage {
    /// Build the message for publish attempt `counter`
    pub fn new(counter: u64, source: &str) -> Self {
        Self::at(counter, source, Utc::now())
    }

    /// Build the message with an explicit timestamp
    pub fn at(counter: u64, source: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            message: format!("Automatic message #{counter}"),
            timestamp,
            source: source.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Extract the counter embedded in `message`, if present
    pub fn counter(&self) -> Option<u64> {
        self.message
            .rsplit_once('#')
            .and_then(|(_, n)| n.parse().ok())
    }
}
