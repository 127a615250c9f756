//! Bridge configuration loaded from the environment
//!
//! Settings are read once at startup into [`RawSettings`], validated into an
//! immutable [`BridgeConfig`], and passed by reference from then on.

use crate::protocol::topics::{validate_topic_filter, validate_topic_name, TopicError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_ENDPOINT: &str = "AWS_IOT_ENDPOINT";
pub const ENV_PORT: &str = "AWS_IOT_PORT";
pub const ENV_CERTIFICATE: &str = "PATH_TO_CERTIFICATE";
pub const ENV_PRIVATE_KEY: &str = "PATH_TO_PRIVATE_KEY";
pub const ENV_ROOT_CA: &str = "PATH_TO_AMAZON_ROOT_CA";
pub const ENV_SUBSCRIBE_TOPIC: &str = "SUBSCRIBE_TOPIC";
pub const ENV_PUBLISH_TOPIC: &str = "PUBLISH_TOPIC";
pub const ENV_PUBLISH_INTERVAL: &str = "PUBLISH_INTERVAL";
pub const ENV_CLIENT_ID: &str = "CLIENT_ID";

/// File read from the working directory before settings are parsed
pub const ENV_FILE: &str = ".env";

/// Default MQTT over TLS port
pub const DEFAULT_PORT: u16 = 8883;
/// Default seconds between publishes
pub const DEFAULT_PUBLISH_INTERVAL_SECS: u64 = 10;

/// Unvalidated settings as read from the environment or the command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSettings {
    pub endpoint: Option<String>,
    pub port: Option<String>,
    pub certificate: Option<String>,
    pub private_key: Option<String>,
    pub root_ca: Option<String>,
    pub subscribe_topic: Option<String>,
    pub publish_topic: Option<String>,
    pub publish_interval: Option<String>,
    pub client_id: Option<String>,
}

impl RawSettings {
    /// Build settings from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            endpoint: lookup(ENV_ENDPOINT),
            port: lookup(ENV_PORT),
            certificate: lookup(ENV_CERTIFICATE),
            private_key: lookup(ENV_PRIVATE_KEY),
            root_ca: lookup(ENV_ROOT_CA),
            subscribe_topic: lookup(ENV_SUBSCRIBE_TOPIC),
            publish_topic: lookup(ENV_PUBLISH_TOPIC),
            publish_interval: lookup(ENV_PUBLISH_INTERVAL),
            client_id: lookup(ENV_CLIENT_ID),
        }
    }

    /// Build settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// Validated, immutable bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    /// Broker host name, e.g. `xxxx-ats.iot.eu-west-1.amazonaws.com`
    pub endpoint: String,
    pub port: u16,
    /// PEM client certificate
    pub certificate_path: PathBuf,
    /// PEM private key matching the client certificate
    pub private_key_path: PathBuf,
    /// PEM root CA used to verify the broker
    pub root_ca_path: PathBuf,
    pub subscribe_topic: String,
    pub publish_topic: String,
    pub publish_interval_secs: u64,
    pub client_id: String,
}

/// A certificate path that does not point at a file
#[derive(Debug, Clone, PartialEq)]
pub struct MissingFile {
    pub label: &'static str,
    pub path: PathBuf,
}

impl fmt::Display for MissingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.path.display())
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingVariables(Vec<&'static str>),
    #[error("Certificate files not found: {}", join_files(.0))]
    MissingCertificateFiles(Vec<MissingFile>),
    #[error("Invalid value for {var}: '{value}' ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("Failed to load {}: {source}", path.display())]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
    #[error("Invalid topic in {var}: {source}")]
    InvalidTopic {
        var: &'static str,
        #[source]
        source: TopicError,
    },
}

fn join_files(files: &[MissingFile]) -> String {
    files
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl ConfigError {
    /// One line per offending variable or file, for console reporting
    pub fn report_lines(&self) -> Vec<String> {
        match self {
            ConfigError::MissingVariables(vars) => vars.iter().map(|v| v.to_string()).collect(),
            ConfigError::MissingCertificateFiles(files) => {
                files.iter().map(ToString::to_string).collect()
            }
            other => vec![other.to_string()],
        }
    }
}

impl BridgeConfig {
    /// Load and validate configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_raw(RawSettings::from_env())
    }

    /// Validate raw settings
    ///
    /// Missing variables are reported all at once before anything else is
    /// checked; certificate files are checked last.
    pub fn from_raw(raw: RawSettings) -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let endpoint = require(ENV_ENDPOINT, raw.endpoint, &mut missing);
        let certificate = require(ENV_CERTIFICATE, raw.certificate, &mut missing);
        let private_key = require(ENV_PRIVATE_KEY, raw.private_key, &mut missing);
        let root_ca = require(ENV_ROOT_CA, raw.root_ca, &mut missing);
        let subscribe_topic = require(ENV_SUBSCRIBE_TOPIC, raw.subscribe_topic, &mut missing);
        let publish_topic = require(ENV_PUBLISH_TOPIC, raw.publish_topic, &mut missing);
        if !missing.is_empty() {
            return Err(ConfigError::MissingVariables(missing));
        }

        let port = parse_port(non_empty(raw.port))?;
        let publish_interval_secs = parse_interval(non_empty(raw.publish_interval))?;

        validate_topic_filter(&subscribe_topic).map_err(|source| ConfigError::InvalidTopic {
            var: ENV_SUBSCRIBE_TOPIC,
            source,
        })?;
        validate_topic_name(&publish_topic).map_err(|source| ConfigError::InvalidTopic {
            var: ENV_PUBLISH_TOPIC,
            source,
        })?;

        let config = BridgeConfig {
            endpoint,
            port,
            certificate_path: PathBuf::from(certificate),
            private_key_path: PathBuf::from(private_key),
            root_ca_path: PathBuf::from(root_ca),
            subscribe_topic,
            publish_topic,
            publish_interval_secs,
            client_id: non_empty(raw.client_id).unwrap_or_else(default_client_id),
        };

        config.validate_certificate_files()?;
        Ok(config)
    }

    /// Check that every certificate path points at an existing file
    pub fn validate_certificate_files(&self) -> Result<(), ConfigError> {
        let missing: Vec<MissingFile> = self
            .certificate_files()
            .into_iter()
            .filter(|(_, path)| !path.is_file())
            .map(|(label, path)| MissingFile {
                label,
                path: path.to_path_buf(),
            })
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingCertificateFiles(missing))
        }
    }

    /// Labelled certificate paths in a fixed order
    pub fn certificate_files(&self) -> [(&'static str, &Path); 3] {
        [
            ("Certificate", self.certificate_path.as_path()),
            ("Private Key", self.private_key_path.as_path()),
            ("Root CA", self.root_ca_path.as_path()),
        ]
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_secs(self.publish_interval_secs)
    }
}

/// Take a required value, recording `var` as missing when absent or blank
fn require(var: &'static str, value: Option<String>, missing: &mut Vec<&'static str>) -> String {
    non_empty(value).unwrap_or_else(|| {
        missing.push(var);
        String::new()
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_port(value: Option<String>) -> Result<u16, ConfigError> {
    let Some(value) = value else {
        return Ok(DEFAULT_PORT);
    };
    match value.parse::<u16>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            var: ENV_PORT,
            value,
            reason: "port must be between 1 and 65535".to_string(),
        }),
        Ok(port) => Ok(port),
        Err(e) => Err(ConfigError::InvalidValue {
            var: ENV_PORT,
            value,
            reason: e.to_string(),
        }),
    }
}

fn parse_interval(value: Option<String>) -> Result<u64, ConfigError> {
    let Some(value) = value else {
        return Ok(DEFAULT_PUBLISH_INTERVAL_SECS);
    };
    match value.parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            var: ENV_PUBLISH_INTERVAL,
            value,
            reason: "interval must be at least 1 second".to_string(),
        }),
        Ok(secs) => Ok(secs),
        Err(e) => Err(ConfigError::InvalidValue {
            var: ENV_PUBLISH_INTERVAL,
            value,
            reason: e.to_string(),
        }),
    }
}

/// Load variables from an env file into the process environment
///
/// Values in the file replace variables already set. Returns `Ok(false)`
/// when the file does not exist.
pub fn load_env_file(path: &Path) -> Result<bool, ConfigError> {
    match dotenvy::from_path_override(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(source) => Err(ConfigError::EnvFile {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Client identifier used when `CLIENT_ID` is unset
pub fn default_client_id() -> String {
    format!("bridge-{}", chrono::Utc::now().timestamp())
}

impl BridgeConfig {
    /// Create a test configuration for unit testing
    ///
    /// Certificate paths are placeholders and do not exist on disk.
    #[cfg(test)]
    pub fn test_config() -> Self {
        BridgeConfig {
            endpoint: "example-ats.iot.eu-west-1.amazonaws.com".to_string(),
            port: DEFAULT_PORT,
            certificate_path: PathBuf::from("certs/device.pem.crt"),
            private_key_path: PathBuf::from("certs/private.pem.key"),
            root_ca_path: PathBuf::from("certs/AmazonRootCA1.pem"),
            subscribe_topic: "commands/bridge".to_string(),
            publish_topic: "telemetry/bridge".to_string(),
            publish_interval_secs: DEFAULT_PUBLISH_INTERVAL_SECS,
            client_id: "test-1".to_string(),
        }
    }
}
