//! Process lifecycle: connect, publish, wait for a signal, disconnect

use super::publisher::TelemetryPublisher;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::transport::mqtt::{MqttClient, ReconnectConfig};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, Instrument};

/// Runs one MQTT connection and the telemetry publisher
pub struct Bridge {
    config: BridgeConfig,
    reconnect_config: ReconnectConfig,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            reconnect_config: ReconnectConfig::default(),
        }
    }

    /// Override the reconnection backoff policy
    pub fn with_reconnect_config(mut self, reconnect_config: ReconnectConfig) -> Self {
        self.reconnect_config = reconnect_config;
        self
    }

    /// Run until `shutdown_rx` turns true
    ///
    /// The event loop runs on the calling task and the publisher on a spawned
    /// one. The publisher is stopped after the DISCONNECT has been flushed.
    pub async fn run(&self, shutdown_rx: watch::Receiver<bool>) -> BridgeResult<()> {
        let span = crate::lifecycle_span!(client_id = %self.config.client_id);

        async {
            let mut client =
                MqttClient::new(&self.config)?.with_reconnect_config(self.reconnect_config.clone());

            let publish_task = TelemetryPublisher::new(client.handle(), &self.config).spawn();
            info!(
                endpoint = %self.config.endpoint,
                port = self.config.port,
                subscribe_topic = %self.config.subscribe_topic,
                publish_topic = %self.config.publish_topic,
                "Bridge started"
            );

            let result = client.run(shutdown_rx).await;

            publish_task.abort();
            if let Err(e) = publish_task.await {
                if e.is_panic() {
                    return Err(BridgeError::internal("Telemetry publisher panicked"));
                }
            }

            result?;
            info!("Bridge stopped");
            Ok(())
        }
        .instrument(span)
        .await
    }
}

/// Install SIGINT and SIGTERM handlers that flip `shutdown_tx` to true
///
/// Handlers are installed before returning so a failure surfaces as a
/// startup error.
pub fn spawn_signal_listener(shutdown_tx: watch::Sender<bool>) -> BridgeResult<JoinHandle<()>> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(BridgeError::Signal)?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(BridgeError::Signal)?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }

        if shutdown_tx.send(true).is_err() {
            error!("Shutdown requested but the bridge has already stopped");
        }
    }))
}
