//! Pure connection state management for MQTT client
//!
//! This module contains connection state, the reconnection backoff policy,
//! transport errors, and construction of the mutual-TLS `MqttOptions`.

use crate::config::BridgeConfig;
use rumqttc::v5::MqttOptions;
use rumqttc::{TlsConfiguration, Transport as RumqttcTransport};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Keepalive interval negotiated with the broker
pub const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Capacity of the request channel between handles and the event loop
pub const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Connection state for MQTT client
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Not connected, with reason
    Disconnected(String),
    /// Initial connection attempt in progress
    Connecting,
    /// CONNACK received, ready for operations
    Connected,
    /// Waiting before reconnection attempt (attempt count)
    Reconnecting(u32),
}

/// Reconnection backoff configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt
    pub min_delay: Duration,
    /// Upper bound for any delay
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(120),
        }
    }
}

impl ReconnectConfig {
    /// Delay before reconnection attempt `attempt` (1-based)
    ///
    /// Doubles from `min_delay` and is capped at `max_delay`: 1s, 2s, 4s, ... 120s.
    pub fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.min_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Failed to read {label} from {}", path.display())]
    CertificateRead {
        label: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Publishing failed")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Subscription failed")]
    SubscriptionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Disconnect failed")]
    DisconnectFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Not connected - current state: {state:?}")]
    NotConnected { state: ConnectionState },
    #[error("Event loop already running")]
    EventLoopTaken,
    #[error("MQTT client dropped, connection state no longer available")]
    StateChannelClosed,
}

fn read_pem(label: &'static str, path: &Path) -> Result<Vec<u8>, MqttError> {
    std::fs::read(path).map_err(|source| MqttError::CertificateRead {
        label,
        path: path.to_path_buf(),
        source,
    })
}

/// Build the mutual-TLS configuration from the certificate files
///
/// The root CA verifies the broker; the client certificate and key
/// authenticate this bridge. rustls only negotiates TLS 1.2 and 1.3.
pub fn load_tls_configuration(config: &BridgeConfig) -> Result<TlsConfiguration, MqttError> {
    let ca = read_pem("Root CA", &config.root_ca_path)?;
    let certificate = read_pem("Certificate", &config.certificate_path)?;
    let private_key = read_pem("Private Key", &config.private_key_path)?;

    Ok(TlsConfiguration::Simple {
        ca,
        alpn: None,
        client_auth: Some((certificate, private_key)),
    })
}

/// Configure MQTT options from the bridge configuration
pub fn configure_mqtt_options(config: &BridgeConfig) -> Result<MqttOptions, MqttError> {
    let mut mqtt_options = MqttOptions::new(
        config.client_id.clone(),
        config.endpoint.clone(),
        config.port,
    );

    let tls = load_tls_configuration(config)?;
    mqtt_options.set_transport(RumqttcTransport::tls_with_config(tls));
    mqtt_options.set_keep_alive(KEEP_ALIVE);
    // Subscriptions are re-issued on every CONNACK
    mqtt_options.set_clean_start(true);

    Ok(mqtt_options)
}
