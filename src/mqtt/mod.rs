//! MQTT transport for the PSU controller.
//!
//! Wraps a rumqttc client so the controller can publish commands and
//! receive status messages through the [`MessageChannel`](crate::channel::MessageChannel)
//! abstraction.

mod client;

pub use client::{MqttChannel, MqttClient};
