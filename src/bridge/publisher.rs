//! Periodic telemetry publisher
//!
//! Runs on its own task, independent of the network event loop, and talks
//! to the connection only through a [`Transport`] handle.

use crate::config::BridgeConfig;
use crate::protocol::TelemetryMessage;
use crate::transport::Transport;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Errors for a single publish attempt
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to serialize message #{counter}")]
    Serialization {
        counter: u64,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to publish message #{counter}: {source}")]
    Transport {
        counter: u64,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl PublishError {
    /// Counter value of the dropped message
    pub fn counter(&self) -> u64 {
        match self {
            PublishError::Serialization { counter, .. } | PublishError::Transport { counter, .. } => {
                *counter
            }
        }
    }
}

/// Publishes a [`TelemetryMessage`] with an increasing counter every interval
pub struct TelemetryPublisher<T: Transport> {
    transport: T,
    topic: String,
    source: String,
    interval: Duration,
    counter: u64,
}

impl<T: Transport + 'static> TelemetryPublisher<T> {
    pub fn new(transport: T, config: &BridgeConfig) -> Self {
        Self {
            transport,
            topic: config.publish_topic.clone(),
            source: config.client_id.clone(),
            interval: config.publish_interval(),
            counter: 0,
        }
    }

    /// Override the publish interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Last counter value used, 0 before the first attempt
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Build and publish the next message
    ///
    /// The counter advances on every call, so a failed attempt consumes its
    /// number and the next message carries the following one.
    pub async fn publish_next(&mut self) -> Result<u64, PublishError> {
        self.counter += 1;
        let counter = self.counter;

        let payload = TelemetryMessage::new(counter, &self.source)
            .to_json()
            .map_err(|source| PublishError::Serialization { counter, source })?;
        debug!(topic = %self.topic, payload = %payload, "Publishing telemetry message");

        self.transport
            .publish(&self.topic, payload.into_bytes())
            .await
            .map_err(|e| PublishError::Transport {
                counter,
                source: Box::new(e),
            })?;

        Ok(counter)
    }

    /// Spawn the publish loop
    ///
    /// The task waits for the first successful connection, publishes
    /// message #1 right away and then one message per interval. Later
    /// disconnects do not pause the schedule; ticks that find the connection
    /// down drop their message. The task runs until aborted.
    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.transport.wait_until_connected().await {
                warn!(error = %e, "Connection unavailable, telemetry publisher stopped");
                return;
            }

            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                topic = %self.topic,
                interval_secs = self.interval.as_secs(),
                "Telemetry publisher started"
            );

            loop {
                // The first tick completes immediately
                interval.tick().await;

                match self.publish_next().await {
                    Ok(counter) => {
                        info!(counter = counter, topic = %self.topic, "Published telemetry message");
                    }
                    Err(e) => {
                        warn!(counter = e.counter(), error = %e, "Telemetry message dropped");
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use crate::transport::mqtt::ConnectionState;

    #[tokio::test]
    async fn test_publish_next_counts_from_one() {
        let transport = MockTransport::new();
        let config = BridgeConfig::test_config();
        let mut publisher = TelemetryPublisher::new(transport.clone(), &config);

        assert_eq!(publisher.counter(), 0);
        assert_eq!(publisher.publish_next().await.unwrap(), 1);
        assert_eq!(publisher.publish_next().await.unwrap(), 2);

        let published = transport.get_published_messages().await;
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].0, "telemetry/bridge");

        let first: TelemetryMessage = serde_json::from_slice(&published[0].1).unwrap();
        assert_eq!(first.message, "Automatic message #1");
        assert_eq!(first.source, "test-1");
    }

    #[tokio::test]
    async fn test_failed_publish_still_advances_counter() {
        let transport = MockTransport::with_failure();
        let config = BridgeConfig::test_config();
        let mut publisher = TelemetryPublisher::new(transport.clone(), &config);

        let err = publisher.publish_next().await.unwrap_err();
        assert_eq!(err.counter(), 1);
        assert!(matches!(err, PublishError::Transport { .. }));

        transport.set_should_fail(false);
        assert_eq!(publisher.publish_next().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_disconnected_transport_drops_message() {
        let transport = MockTransport::new();
        transport.set_state(ConnectionState::Reconnecting(1));
        let config = BridgeConfig::test_config();
        let mut publisher = TelemetryPublisher::new(transport.clone(), &config);

        assert!(publisher.publish_next().await.is_err());
        assert!(transport.get_published_messages().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_publisher_publishes_first_message_on_connect() {
        let transport = MockTransport::new();
        transport.set_state(ConnectionState::Connecting);
        let config = BridgeConfig::test_config();
        let handle = TelemetryPublisher::new(transport.clone(), &config)
            .with_interval(Duration::from_millis(500))
            .spawn();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(transport.get_published_messages().await.is_empty());

        transport.set_state(ConnectionState::Connected);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.get_published_messages().await.len(), 1);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(transport.get_published_messages().await.len(), 2);

        handle.abort();
        let _ = handle.await;
    }
}
