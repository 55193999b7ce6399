use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: called from main before the tokio runtime starts any threads
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let mut value = value.trim();

            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            pairs.push((key.trim(), value));
        }
    }

    pairs
}

/// MQTT broker connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: format!("psucontrol-mqtt-{}", uuid::Uuid::new_v4().simple()),
            username: None,
            password: None,
        }
    }
}

impl MqttConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("MQTT_BROKER_HOST") {
            config.broker_host = host;
        }
        if let Ok(port) = std::env::var("MQTT_BROKER_PORT")
            && let Ok(p) = port.parse()
        {
            config.broker_port = p;
        }
        if let Ok(client_id) = std::env::var("MQTT_CLIENT_ID") {
            config.client_id = client_id;
        }
        if let Ok(username) = std::env::var("MQTT_USERNAME") {
            config.username = Some(username);
        }
        if let Ok(password) = std::env::var("MQTT_PASSWORD") {
            config.password = Some(password);
        }

        config
    }
}

/// Source of PSU channel settings.
///
/// Returns `None` for keys the store does not hold; [`ChannelConfig::load`]
/// substitutes the declared default.
pub trait ConfigReader: Send + Sync {
    fn get_string(&self, key: &str) -> Option<String>;
    fn get_bool(&self, key: &str) -> Option<bool>;
}

pub const CONTROL_TOPIC: &str = "control_topic";
pub const STATE_TOPIC: &str = "state_topic";
pub const ON_COMMAND: &str = "on_command";
pub const OFF_COMMAND: &str = "off_command";
pub const QUERY_DEVICE_STATUS: &str = "query_device_status";
pub const QUERY_TOPIC: &str = "query_topic";
pub const QUERY_PAYLOAD: &str = "query_payload";
pub const RESPONSE_ON: &str = "response_on";
pub const RESPONSE_OFF: &str = "response_off";

/// Topics, commands and response formats for one PSU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub control_topic: String,
    pub state_topic: String,
    pub on_command: String,
    pub off_command: String,
    pub query_device_status: bool,
    pub query_topic: String,
    pub query_payload: String,
    pub response_on: String,
    pub response_off: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            control_topic: String::new(),
            state_topic: String::new(),
            on_command: "ON".to_string(),
            off_command: "OFF".to_string(),
            query_device_status: false,
            query_topic: String::new(),
            query_payload: String::new(),
            response_on: "ON".to_string(),
            response_off: "OFF".to_string(),
        }
    }
}

impl ChannelConfig {
    /// Read every field from `reader`, falling back to the defaults.
    pub fn load(reader: &dyn ConfigReader) -> Self {
        let defaults = Self::default();
        let string = |key: &str, default: String| reader.get_string(key).unwrap_or(default);

        let config = Self {
            control_topic: string(CONTROL_TOPIC, defaults.control_topic),
            state_topic: string(STATE_TOPIC, defaults.state_topic),
            on_command: string(ON_COMMAND, defaults.on_command),
            off_command: string(OFF_COMMAND, defaults.off_command),
            query_device_status: reader
                .get_bool(QUERY_DEVICE_STATUS)
                .unwrap_or(defaults.query_device_status),
            query_topic: string(QUERY_TOPIC, defaults.query_topic),
            query_payload: string(QUERY_PAYLOAD, defaults.query_payload),
            response_on: string(RESPONSE_ON, defaults.response_on),
            response_off: string(RESPONSE_OFF, defaults.response_off),
        };
        config.log_values();
        config
    }

    fn log_values(&self) {
        log::debug!("{}: {}", CONTROL_TOPIC, self.control_topic);
        log::debug!("{}: {}", STATE_TOPIC, self.state_topic);
        log::debug!("{}: {}", ON_COMMAND, self.on_command);
        log::debug!("{}: {}", OFF_COMMAND, self.off_command);
        log::debug!("{}: {}", QUERY_DEVICE_STATUS, self.query_device_status);
        log::debug!("{}: {}", QUERY_TOPIC, self.query_topic);
        log::debug!("{}: {}", QUERY_PAYLOAD, self.query_payload);
        log::debug!("{}: {}", RESPONSE_ON, self.response_on);
        log::debug!("{}: {}", RESPONSE_OFF, self.response_off);
    }
}
