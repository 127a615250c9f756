//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading: which settings are
//! required, which defaults apply, and what the errors name.


use std::time::Duration;
use telemetry_bridge::config::{
    BridgeConfig, ConfigError, DEFAULT_PORT, DEFAULT_PUBLISH_INTERVAL_SECS,
};
use telemetry_bridge::error::{BridgeError, EXIT_CONFIG_ERROR};
use test_helpers::{settings_from, CertFixture};

const REQUIRED: [&str; 6] = [
    "AWS_IOT_ENDPOINT",
    "PATH_TO_CERTIFICATE",
    "PATH_TO_PRIVATE_KEY",
    "PATH_TO_AMAZON_ROOT_CA",
    "SUBSCRIBE_TOPIC",
    "PUBLISH_TOPIC",
];

#[test]
fn test_config_loads_with_defaults() {
    let fixture = CertFixture::new();
    let config = fixture.config();

    assert_eq!(config.endpoint, "example-ats.iot.eu-west-1.amazonaws.com");
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.publish_interval_secs, DEFAULT_PUBLISH_INTERVAL_SECS);
    assert_eq!(config.publish_interval(), Duration::from_secs(10));
    assert_eq!(config.client_id, "test-1");
    assert_eq!(config.certificate_path, fixture.certificate);
}

#[test]
fn test_optional_values_override_defaults() {
    let fixture = CertFixture::new();
    let mut env = fixture.env();
    env.insert("AWS_IOT_PORT", "443".to_string());
    env.insert("PUBLISH_INTERVAL", "30".to_string());

    let config = BridgeConfig::from_raw(settings_from(&env)).unwrap();
    assert_eq!(config.port, 443);
    assert_eq!(config.publish_interval(), Duration::from_secs(30));
}

#[test]
fn test_missing_client_id_is_generated() {
    let fixture = CertFixture::new();
    let mut env = fixture.env();
    env.remove("CLIENT_ID");

    let config = BridgeConfig::from_raw(settings_from(&env)).unwrap();
    let suffix = config.client_id.strip_prefix("bridge-").unwrap();
    assert!(suffix.parse::<i64>().is_ok());
}

#[test]
fn test_each_missing_variable_is_named() {
    let fixture = CertFixture::new();

    for var in REQUIRED {
        let mut env = fixture.env();
        env.remove(var);

        match BridgeConfig::from_raw(settings_from(&env)) {
            Err(ConfigError::MissingVariables(missing)) => assert_eq!(missing, vec![var]),
            other => panic!("Expected MissingVariables for {var}, got {other:?}"),
        }
    }
}

#[test]
fn test_blank_variable_counts_as_missing() {
    let fixture = CertFixture::new();
    let mut env = fixture.env();
    env.insert("PUBLISH_TOPIC", "   ".to_string());

    let err = BridgeConfig::from_raw(settings_from(&env)).unwrap_err();
    assert!(matches!(err, ConfigError::MissingVariables(ref v) if v == &vec!["PUBLISH_TOPIC"]));
}

#[test]
fn test_all_missing_variables_reported_together() {
    let err = BridgeConfig::from_raw(Default::default()).unwrap_err();

    let lines = err.report_lines();
    assert_eq!(lines, REQUIRED.to_vec());
    for var in REQUIRED {
        assert!(err.to_string().contains(var));
    }
}

#[test]
fn test_missing_certificate_file_is_named() {
    let fixture = CertFixture::new();
    let mut env = fixture.env();
    let missing = fixture.dir.path().join("nope.pem.key");
    env.insert("PATH_TO_PRIVATE_KEY", missing.display().to_string());

    match BridgeConfig::from_raw(settings_from(&env)) {
        Err(ConfigError::MissingCertificateFiles(files)) => {
            assert_eq!(files.len(), 1);
            assert_eq!(files[0].label, "Private Key");
            assert_eq!(files[0].path, missing);
        }
        other => panic!("Expected MissingCertificateFiles, got {other:?}"),
    }
}

#[test]
fn test_every_missing_certificate_file_is_listed() {
    let fixture = CertFixture::new();
    let env = fixture.env();
    drop(fixture);

    let err = BridgeConfig::from_raw(settings_from(&env)).unwrap_err();
    let lines = err.report_lines();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Certificate: "));
    assert!(lines[1].starts_with("Private Key: "));
    assert!(lines[2].starts_with("Root CA: "));
}

#[test]
fn test_directory_is_not_a_certificate_file() {
    let fixture = CertFixture::new();
    let mut env = fixture.env();
    env.insert("PATH_TO_AMAZON_ROOT_CA", fixture.dir.path().display().to_string());

    assert!(matches!(
        BridgeConfig::from_raw(settings_from(&env)),
        Err(ConfigError::MissingCertificateFiles(_))
    ));
}

#[test]
fn test_invalid_numbers_are_rejected() {
    let fixture = CertFixture::new();
    let cases = [
        ("AWS_IOT_PORT", "eighty"),
        ("AWS_IOT_PORT", "0"),
        ("AWS_IOT_PORT", "70000"),
        ("PUBLISH_INTERVAL", "-5"),
        ("PUBLISH_INTERVAL", "0"),
        ("PUBLISH_INTERVAL", "1.5"),
    ];

    for (var, value) in cases {
        let mut env = fixture.env();
        env.insert(var, value.to_string());

        match BridgeConfig::from_raw(settings_from(&env)) {
            Err(ConfigError::InvalidValue { var: named, value: v, .. }) => {
                assert_eq!(named, var);
                assert_eq!(v, value);
            }
            other => panic!("Expected InvalidValue for {var}={value}, got {other:?}"),
        }
    }
}

#[test]
fn test_invalid_topics_are_rejected() {
    let fixture = CertFixture::new();

    let mut env = fixture.env();
    env.insert("PUBLISH_TOPIC", "telemetry/+".to_string());
    assert!(matches!(
        BridgeConfig::from_raw(settings_from(&env)),
        Err(ConfigError::InvalidTopic { var: "PUBLISH_TOPIC", .. })
    ));

    let mut env = fixture.env();
    env.insert("SUBSCRIBE_TOPIC", "commands/#/bridge".to_string());
    assert!(matches!(
        BridgeConfig::from_raw(settings_from(&env)),
        Err(ConfigError::InvalidTopic { var: "SUBSCRIBE_TOPIC", .. })
    ));
}

#[test]
fn test_wildcard_subscription_is_accepted() {
    let fixture = CertFixture::new();
    let mut env = fixture.env();
    env.insert("SUBSCRIBE_TOPIC", "commands/+/bridge/#".to_string());

    let config = BridgeConfig::from_raw(settings_from(&env)).unwrap();
    assert_eq!(config.subscribe_topic, "commands/+/bridge/#");
}

#[test]
fn test_config_errors_map_to_exit_code_one() {
    let err: BridgeError = BridgeConfig::from_raw(Default::default())
        .unwrap_err()
        .into();
    assert_eq!(err.exit_code(), EXIT_CONFIG_ERROR);
}

#[test]
fn test_config_renders_as_toml() {
    let fixture = CertFixture::new();
    let config = fixture.config();

    let rendered = toml::to_string_pretty(&config).unwrap();
    assert!(rendered.contains("client_id = \"test-1\""));
    assert!(rendered.contains("port = 8883"));

    let parsed: BridgeConfig = toml::from_str(&rendered).unwrap();
    assert_eq!(parsed, config);
}
