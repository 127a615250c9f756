//! Top-level error type and process exit codes
//!
//! Every failure that can end the process is funnelled into [`BridgeError`],
//! which decides the exit status.

use crate::config::ConfigError;
use crate::transport::mqtt::MqttError;
use thiserror::Error;

/// Clean shutdown after an interrupt
pub const EXIT_OK: i32 = 0;
/// Configuration could not be loaded or validated
pub const EXIT_CONFIG_ERROR: i32 = 1;
/// The connection could not be set up or the runtime failed
pub const EXIT_FATAL_ERROR: i32 = 2;

/// Main error type for bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("MQTT error: {0}")]
    Mqtt(#[from] MqttError),

    #[error("Signal handling error: {0}")]
    Signal(#[source] std::io::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BridgeError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            BridgeError::Config(_) => EXIT_CONFIG_ERROR,
            BridgeError::Mqtt(_) | BridgeError::Signal(_) | BridgeError::Internal { .. } => {
                EXIT_FATAL_ERROR
            }
        }
    }

    /// Create internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_exit_with_one() {
        let error: BridgeError = ConfigError::MissingVariables(vec!["AWS_IOT_ENDPOINT"]).into();
        assert_eq!(error.exit_code(), EXIT_CONFIG_ERROR);
        assert!(error.to_string().contains("AWS_IOT_ENDPOINT"));
    }

    #[test]
    fn test_mqtt_errors_exit_with_two() {
        let error: BridgeError = MqttError::EventLoopTaken.into();
        assert_eq!(error.exit_code(), EXIT_FATAL_ERROR);
    }

    #[test]
    fn test_signal_and_internal_errors_are_fatal() {
        let signal = BridgeError::Signal(std::io::Error::other("no handler"));
        assert_eq!(signal.exit_code(), EXIT_FATAL_ERROR);

        let internal = BridgeError::internal("publish task panicked");
        assert_eq!(internal.exit_code(), EXIT_FATAL_ERROR);
        assert_eq!(internal.to_string(), "Internal error: publish task panicked");
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        assert_ne!(EXIT_OK, EXIT_CONFIG_ERROR);
        assert_ne!(EXIT_CONFIG_ERROR, EXIT_FATAL_ERROR);
        assert_ne!(EXIT_OK, EXIT_FATAL_ERROR);
    }
}
