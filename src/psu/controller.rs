//! PSU status controller.
//!
//! Owns the held [`PsuStatus`] together with the channel configuration and
//! the compiled matcher. Commands are open loop: `turn_on`/`turn_off` only
//! publish, and the status changes once the device confirms on the status
//! topic.
//!
//! Inbound messages may arrive on a transport thread while settings changes
//! arrive from the host, so all three pieces of state sit behind one mutex.
//! Channel calls are always made with that mutex released.

use super::classifier::{Classification, classify};
use super::matcher::{CompiledMatcher, compile};
use crate::channel::{MessageChannel, MessageHandler, topic_matches};
use crate::config::{ChannelConfig, ConfigReader};
use crate::error::PsuError;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use strum::Display;

/// Power state as last reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PsuStatus {
    /// No confirmation received yet.
    #[default]
    Unset,
    On,
    Off,
}

struct ControllerState {
    config: ChannelConfig,
    matcher: CompiledMatcher,
    status: PsuStatus,
}

/// Bridges a PSU exposed over a [`MessageChannel`] to a boolean
/// on/off/status interface.
pub struct StatusController {
    channel: Arc<dyn MessageChannel>,
    settings: Arc<dyn ConfigReader>,
    state: Mutex<ControllerState>,
    /// Serializes `start` and `on_settings_changed` so an unsubscribe is
    /// never interleaved with another reload's subscribe.
    reconfigure: Mutex<()>,
    this: Weak<StatusController>,
}

impl StatusController {
    /// Create a controller. Nothing is loaded or subscribed until
    /// [`start`](Self::start) is called.
    pub fn new(channel: Arc<dyn MessageChannel>, settings: Arc<dyn ConfigReader>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            channel,
            settings,
            state: Mutex::new(ControllerState {
                config: ChannelConfig::default(),
                matcher: CompiledMatcher::disabled(),
                status: PsuStatus::Unset,
            }),
            reconfigure: Mutex::new(()),
            this: this.clone(),
        })
    }

    /// Load settings, compile the matcher and subscribe to the status topic.
    pub fn start(&self) {
        let _guard = self.reconfigure.lock();
        let state_topic = self.reload();
        self.subscribe(&state_topic);
    }

    /// Apply changed settings: unsubscribe from the old status topic,
    /// reload, recompile and subscribe to the new one. The held status is
    /// kept.
    pub fn on_settings_changed(&self) {
        let _guard = self.reconfigure.lock();

        let old_topic = self.state.lock().config.state_topic.clone();
        info!("[PSU] Unsubscribing from {}", old_topic);
        if let Err(e) = self.channel.unsubscribe(&old_topic) {
            warn!("[PSU] Unsubscribe failed: {}", e);
        }

        let state_topic = self.reload();
        self.subscribe(&state_topic);
    }

    /// Publish the on command. Does not change the held status.
    pub fn turn_on(&self) {
        debug!("[PSU] Switching PSU on");
        let (topic, payload) = {
            let state = self.state.lock();
            (
                state.config.control_topic.clone(),
                state.config.on_command.clone(),
            )
        };
        self.publish(&topic, &payload);
        self.query_device();
    }

    /// Publish the off command. Does not change the held status.
    pub fn turn_off(&self) {
        debug!("[PSU] Switching PSU off");
        let (topic, payload) = {
            let state = self.state.lock();
            (
                state.config.control_topic.clone(),
                state.config.off_command.clone(),
            )
        };
        self.publish(&topic, &payload);
        self.query_device();
    }

    /// Current held status. With query-on-read enabled this also asks the
    /// device for a fresh status message, but never waits for it.
    pub fn get_status(&self) -> PsuStatus {
        self.query_device();
        self.state.lock().status
    }

    /// Route one inbound message. Messages on other topics are ignored.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) {
        debug!(
            "[MQTT] Received message on {}: {}",
            topic,
            String::from_utf8_lossy(payload)
        );

        let mut state = self.state.lock();
        if state.config.state_topic.is_empty() || !topic_matches(&state.config.state_topic, topic)
        {
            return;
        }

        let new_status = match classify(&state.matcher, payload) {
            Classification::On => PsuStatus::On,
            Classification::Off => PsuStatus::Off,
            Classification::Unknown => {
                warn!("[PSU] Unknown PSU status, keeping {}", state.status);
                return;
            }
        };

        if state.status != new_status {
            info!("[PSU] PSU status {} -> {}", state.status, new_status);
        }
        state.status = new_status;
    }

    /// Snapshot of the active configuration.
    pub fn config(&self) -> ChannelConfig {
        self.state.lock().config.clone()
    }

    /// Snapshot of the active matcher.
    pub fn matcher(&self) -> CompiledMatcher {
        self.state.lock().matcher.clone()
    }

    /// Handler that forwards deliveries to this controller while it is alive.
    fn message_handler(&self) -> MessageHandler {
        let this = self.this.clone();
        Arc::new(move |topic: &str, payload: &[u8]| {
            if let Some(controller) = this.upgrade() {
                controller.handle_message(topic, payload);
            }
        })
    }

    /// Swap in freshly loaded settings and matcher; returns the status topic.
    fn reload(&self) -> String {
        let config = ChannelConfig::load(self.settings.as_ref());
        check_config(&config);
        let matcher = build_matcher(&config);
        let state_topic = config.state_topic.clone();

        let mut state = self.state.lock();
        state.config = config;
        state.matcher = matcher;
        state_topic
    }

    fn subscribe(&self, topic: &str) {
        info!("[PSU] Subscribing to {}", topic);
        if let Err(e) = self.channel.subscribe(topic, self.message_handler()) {
            warn!("[PSU] Subscribe failed: {}", e);
        }
    }

    fn publish(&self, topic: &str, payload: &str) {
        debug!("[PSU] Publishing to {}: {}", topic, payload);
        if let Err(e) = self.channel.publish(topic, payload) {
            warn!("[PSU] Publish failed: {}", e);
        }
    }

    fn query_device(&self) {
        let query = {
            let state = self.state.lock();
            state.config.query_device_status.then(|| {
                (
                    state.config.query_topic.clone(),
                    state.config.query_payload.clone(),
                )
            })
        };
        if let Some((topic, payload)) = query {
            self.publish(&topic, &payload);
        }
    }
}

fn build_matcher(config: &ChannelConfig) -> CompiledMatcher {
    match compile(&config.response_on, &config.response_off) {
        Ok((matcher, warnings)) => {
            for warning in warnings {
                warn!("[PSU] {}", PsuError::from(warning));
            }
            debug!(
                "[PSU] Matcher compiled: key={:?} on={:?} off={:?}",
                matcher.extraction_key(),
                matcher.on_literal(),
                matcher.off_literal()
            );
            matcher
        }
        Err(e) => {
            warn!("[PSU] {}, status messages will be ignored", e);
            CompiledMatcher::disabled()
        }
    }
}

fn check_config(config: &ChannelConfig) {
    let mut missing = Vec::new();
    if config.control_topic.is_empty() {
        missing.push(PsuError::ConfigIncomplete("control topic is empty"));
    }
    if config.state_topic.is_empty() {
        missing.push(PsuError::ConfigIncomplete("state topic is empty"));
    }
    if config.query_device_status && config.query_topic.is_empty() {
        missing.push(PsuError::ConfigIncomplete(
            "status query enabled but query topic is empty",
        ));
    }
    for e in missing {
        warn!("[PSU] {}", e);
    }
}
