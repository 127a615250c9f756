//! Telemetry bridge - Main Entry Point
//!
//! Loads configuration from the environment (or flags), then runs the MQTT
//! connection and publisher until SIGINT or SIGTERM.

use clap::{Args, Parser, Subcommand};
use std::process;
use telemetry_bridge::bridge::{spawn_signal_listener, Bridge};
use std::path::Path;
use telemetry_bridge::config::{load_env_file, BridgeConfig, ConfigError, RawSettings, ENV_FILE};
use telemetry_bridge::error::{BridgeError, BridgeResult, EXIT_CONFIG_ERROR, EXIT_OK};
use telemetry_bridge::observability::init_default_logging;
use tokio::sync::watch;
use tracing::{error, info};

/// MQTT telemetry bridge for AWS IoT Core
#[derive(Parser)]
#[command(name = "telemetry-bridge")]
#[command(about = "Publish periodic telemetry to AWS IoT Core and log incoming messages")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    settings: SettingsArgs,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Connection settings; each flag falls back to its environment variable
#[derive(Args)]
struct SettingsArgs {
    /// AWS IoT Core endpoint host name
    #[arg(long, env = "AWS_IOT_ENDPOINT", global = true)]
    endpoint: Option<String>,

    /// Broker port [default: 8883]
    #[arg(long, env = "AWS_IOT_PORT", global = true)]
    port: Option<String>,

    /// Client certificate (PEM)
    #[arg(long, env = "PATH_TO_CERTIFICATE", global = true)]
    certificate: Option<String>,

    /// Client private key (PEM)
    #[arg(long, env = "PATH_TO_PRIVATE_KEY", global = true)]
    private_key: Option<String>,

    /// Root CA used to verify the broker (PEM)
    #[arg(long, env = "PATH_TO_AMAZON_ROOT_CA", global = true)]
    root_ca: Option<String>,

    /// Topic filter to subscribe to
    #[arg(long, env = "SUBSCRIBE_TOPIC", global = true)]
    subscribe_topic: Option<String>,

    /// Topic to publish telemetry on
    #[arg(long, env = "PUBLISH_TOPIC", global = true)]
    publish_topic: Option<String>,

    /// Seconds between publishes [default: 10]
    #[arg(long, env = "PUBLISH_INTERVAL", global = true)]
    publish_interval: Option<String>,

    /// MQTT client identifier [default: bridge-<unix time>]
    #[arg(long, env = "CLIENT_ID", global = true)]
    client_id: Option<String>,
}

impl From<SettingsArgs> for RawSettings {
    fn from(args: SettingsArgs) -> Self {
        RawSettings {
            endpoint: args.endpoint,
            port: args.port,
            certificate: args.certificate,
            private_key: args.private_key,
            root_ca: args.root_ca,
            subscribe_topic: args.subscribe_topic,
            publish_topic: args.publish_topic,
            publish_interval: args.publish_interval,
            client_id: args.client_id,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and run until interrupted (default)
    Run,
    /// Validate configuration and certificate files
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    // Loaded before parsing so flag defaults see the file's values
    let env_file = load_env_file(Path::new(ENV_FILE));
    let cli = Cli::parse();

    init_default_logging(cli.verbose);

    info!("Starting telemetry-bridge v{}", env!("CARGO_PKG_VERSION"));

    match env_file {
        Ok(true) => info!("Loaded environment from {}", ENV_FILE),
        Ok(false) => {}
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(EXIT_CONFIG_ERROR);
        }
    }

    let config = match BridgeConfig::from_raw(cli.settings.into()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            for line in e.report_lines() {
                error!("  - {}", line);
            }
            if matches!(e, ConfigError::MissingVariables(_)) {
                error!("Set them in the environment or in {}", ENV_FILE);
            }
            process::exit(EXIT_CONFIG_ERROR);
        }
    };

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_bridge(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(e.exit_code());
    }

    info!("Application shutdown complete");
    process::exit(EXIT_OK);
}

async fn run_bridge(config: BridgeConfig) -> BridgeResult<()> {
    info!(
        endpoint = %config.endpoint,
        port = config.port,
        client_id = %config.client_id,
        certificate = %config.certificate_path.display(),
        private_key = %config.private_key_path.display(),
        root_ca = %config.root_ca_path.display(),
        subscribe_topic = %config.subscribe_topic,
        publish_topic = %config.publish_topic,
        publish_interval_secs = config.publish_interval_secs,
        "Configuration loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signal_task = spawn_signal_listener(shutdown_tx)?;

    let result = Bridge::new(config).run(shutdown_rx).await;
    signal_task.abort();
    result
}

fn handle_config_command(config: &BridgeConfig, show: bool) -> BridgeResult<()> {
    if show {
        let rendered = toml::to_string_pretty(config)
            .map_err(|e| BridgeError::internal(format!("Failed to render configuration: {e}")))?;
        println!("Current configuration:");
        println!("{rendered}");
    }

    info!("Configuration validation complete");
    Ok(())
}
