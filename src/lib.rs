//! PSU Control over MQTT.
//!
//! Exposes a PSU whose power state lives behind an MQTT command/status topic
//! pair as a simple on/off/status interface.

pub mod channel;
pub mod config;
pub mod error;
pub mod mqtt;
pub mod psu;
pub mod settings;
