//! MQTT v5 client over mutual TLS
//!
//! The client is split into focused sub-modules that separate pure
//! decisions from I/O:
//!
//! - [`connection`] - Connection state, backoff policy and TLS options
//! - [`message_handler`] - Pure routing of event loop output
//! - [`health_monitor`] - Pure reconnection and state transition logic
//! - [`client`] - Impure I/O operations and coordination
//!
//! # Usage
//!
//! ```rust,no_run
//! use telemetry_bridge::config::BridgeConfig;
//! use telemetry_bridge::transport::mqtt::MqttClient;
//! use tokio::sync::watch;
//!
//! # tokio_test::block_on(async {
//! let config = BridgeConfig::from_env()?;
//! let mut client = MqttClient::new(&config)?;
//! let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//! client.run(shutdown_rx).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod health_monitor;
pub mod message_handler;

pub use client::{MqttClient, MqttHandle};
pub use connection::{ConnectionState, MqttError, ReconnectConfig};
pub use health_monitor::{ConnectionEvent, HealthMonitor, ReconnectionDecision};
pub use message_handler::{EventRoute, MessageHandler};
