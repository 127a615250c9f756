//! Testing utilities and mock implementations
//!
//! This module provides a mock transport for testing the bridge without an
//! MQTT broker.

pub mod mocks;

pub use mocks::*;
