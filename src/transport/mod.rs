//! Transport layer for the telemetry bridge
//!
//! This module provides the transport abstraction and its MQTT
//! implementation over mutual TLS.

use crate::transport::mqtt::ConnectionState;

pub mod mqtt;

/// Transport trait for broker communication
///
/// This trait provides an abstraction over the broker connection so the
/// publisher and the event dispatch can be exercised without a network.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Publish a payload to `topic` at QoS 1, not retained
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Self::Error>;

    /// Subscribe to a topic filter at QoS 1
    async fn subscribe(&self, topic: &str) -> Result<(), Self::Error>;

    /// Wait until the connection is up and requests are accepted
    ///
    /// Fails only when the connection can never come up again.
    async fn wait_until_connected(&self) -> Result<(), Self::Error>;

    /// Request a graceful disconnect from the broker
    async fn disconnect(&self) -> Result<(), Self::Error>;

    /// Get current connection state
    fn connection_state(&self) -> ConnectionState;

    /// Check if transport is currently connected
    fn is_connected(&self) -> bool {
        matches!(self.connection_state(), ConnectionState::Connected)
    }
}
