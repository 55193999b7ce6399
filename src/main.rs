use clap::Parser;
use log::{error, info, warn};
use psucontrol_mqtt::config::{MqttConfig, load_dotenv};
use psucontrol_mqtt::mqtt::MqttClient;
use psucontrol_mqtt::psu::StatusController;
use psucontrol_mqtt::settings::JsonFileSettings;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use strum::EnumString;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;

/// Control an MQTT-connected PSU from the console.
#[derive(Parser, Debug)]
#[command(name = "psucontrol-mqtt", version, about)]
struct Args {
    /// Settings file (JSON object with topics, commands and responses)
    #[arg(short, long, env = "PSUCONTROL_SETTINGS")]
    settings: Option<PathBuf>,

    /// MQTT broker host (overrides MQTT_BROKER_HOST)
    #[arg(long)]
    broker_host: Option<String>,

    /// MQTT broker port (overrides MQTT_BROKER_PORT)
    #[arg(long)]
    broker_port: Option<u16>,

    /// MQTT client id (overrides MQTT_CLIENT_ID)
    #[arg(long)]
    client_id: Option<String>,
}

/// Line commands accepted on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
enum ConsoleCommand {
    On,
    Off,
    Status,
    Reload,
    #[strum(serialize = "quit", serialize = "exit")]
    Quit,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() -> ExitCode {
    // Must run before the tokio runtime spawns worker threads
    load_dotenv();
    init_logger();

    let args = Args::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let code = runtime.block_on(run(args));
    // The stdin reader sits in a blocking read that never finishes on its own
    runtime.shutdown_background();
    code
}

async fn run(args: Args) -> ExitCode {
    info!("Starting PSU Control - MQTT");

    let mut mqtt_config = MqttConfig::from_env();
    if let Some(host) = args.broker_host {
        mqtt_config.broker_host = host;
    }
    if let Some(port) = args.broker_port {
        mqtt_config.broker_port = port;
    }
    if let Some(client_id) = args.client_id {
        mqtt_config.client_id = client_id;
    }

    let settings_path = args.settings.unwrap_or_else(JsonFileSettings::default_path);
    let settings = match JsonFileSettings::open(&settings_path) {
        Ok(settings) => Arc::new(settings),
        Err(e) => {
            error!(
                "Failed to load settings from {}: {}",
                settings_path.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    };
    info!("Settings: {}", settings.path().display());
    info!(
        "Connecting to MQTT broker at {}:{}",
        mqtt_config.broker_host, mqtt_config.broker_port
    );

    let mqtt_client = MqttClient::new(&mqtt_config);
    let controller = StatusController::new(Arc::new(mqtt_client.channel()), settings.clone());
    controller.start();

    let mqtt_handle = tokio::spawn(mqtt_client.run());
    let console_handle = tokio::spawn(run_console(controller, settings));

    info!("Commands: on, off, status, reload, quit");

    tokio::select! {
        _ = mqtt_handle => {
            warn!("MQTT event loop ended");
        }
        _ = console_handle => {
            info!("Console closed");
        }
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Received shutdown signal");
        }
    }

    info!("PSU Control - MQTT stopped");
    ExitCode::SUCCESS
}

async fn run_console(controller: Arc<StatusController>, settings: Arc<JsonFileSettings>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read from stdin: {}", e);
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match ConsoleCommand::from_str(line) {
            Ok(ConsoleCommand::On) => controller.turn_on(),
            Ok(ConsoleCommand::Off) => controller.turn_off(),
            Ok(ConsoleCommand::Status) => {
                info!("PSU status: {}", controller.get_status());
            }
            Ok(ConsoleCommand::Reload) => match settings.reload() {
                Ok(()) => controller.on_settings_changed(),
                Err(e) => error!("Failed to reload settings: {}", e),
            },
            Ok(ConsoleCommand::Quit) => break,
            Err(_) => warn!("Unknown command: {}", line),
        }
    }
}
