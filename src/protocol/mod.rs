//! Wire-level types for the telemetry bridge
//!
//! Outbound message payloads and MQTT topic validation.

pub mod messages;
pub mod topics;

pub use messages::*;
pub use topics::*;
