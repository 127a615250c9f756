//! Bridge orchestration
//!
//! Ties the MQTT connection and the periodic telemetry publisher together
//! for the lifetime of the process.

pub mod lifecycle;
pub mod publisher;

pub use lifecycle::{spawn_signal_listener, Bridge};
pub use publisher::{PublishError, TelemetryPublisher};
