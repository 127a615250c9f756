//! Telemetry Bridge
//!
//! A small MQTT bridge for AWS IoT Core: it connects over mutual TLS,
//! subscribes to one topic and logs what arrives, and publishes a JSON
//! counter message on another topic at a fixed interval.
//!
//! # Overview
//!
//! - [`config`] - Environment driven configuration with validation
//! - [`protocol`] - Outbound message type and topic validation
//! - [`transport`] - MQTT v5 client, reconnection policy, event routing
//! - [`bridge`] - Publisher task and process lifecycle
//! - [`observability`] - Structured logging
//!
//! # Quick Start
//!
//! ```rust
//! use telemetry_bridge::protocol::TelemetryMessage;
//!
//! let message = TelemetryMessage::new(1, "bridge-1700000000");
//! let json = message.to_json().unwrap();
//!
//! assert!(json.contains("Automatic message #1"));
//! assert_eq!(message.counter(), Some(1));
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod testing;
pub mod transport;

pub use bridge::{Bridge, TelemetryPublisher};
pub use config::{BridgeConfig, ConfigError, RawSettings};
pub use error::{BridgeError, BridgeResult};
pub use protocol::TelemetryMessage;
pub use transport::mqtt::{MqttClient, MqttHandle};
pub use transport::Transport;
