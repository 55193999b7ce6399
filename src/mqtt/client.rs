//! rumqttc-backed implementation of [`MessageChannel`].

use crate::channel::{
    MessageChannel, MessageHandler, topic_matches, validate_filter, validate_topic,
};
use crate::config::MqttConfig;
use crate::error::{ChannelError, ChannelErrorReason};
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

type HandlerMap = Arc<RwLock<HashMap<String, MessageHandler>>>;

/// MQTT connection owning the event loop.
pub struct MqttClient {
    client: AsyncClient,
    event_loop: EventLoop,
    handlers: HandlerMap,
}

impl MqttClient {
    /// Create a new MQTT client from configuration.
    ///
    /// No connection is made until [`run`](Self::run) polls the event loop;
    /// requests issued before that are queued.
    pub fn new(config: &MqttConfig) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(30));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 100);

        Self {
            client,
            event_loop,
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Handle for publishing and subscribing from other tasks or threads.
    pub fn channel(&self) -> MqttChannel {
        MqttChannel {
            client: self.client.clone(),
            handlers: self.handlers.clone(),
        }
    }

    /// Run the MQTT event loop, dispatching incoming publishes to the
    /// registered handlers.
    ///
    /// Runs indefinitely. Connection errors are logged and retried after
    /// five seconds; subscriptions are restored on every reconnect.
    pub async fn run(mut self) {
        info!("[MQTT] Starting event loop");
        let mut connected_before = false;

        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("[MQTT] Connected");
                    if connected_before {
                        self.resubscribe();
                    }
                    connected_before = true;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    dispatch(&self.handlers, &publish.topic, &publish.payload);
                }
                Ok(_) => {}
                Err(e) => {
                    error!("[MQTT] Connection error: {:?}", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }

    fn resubscribe(&self) {
        let filters: Vec<String> = self.handlers.read().keys().cloned().collect();
        for filter in filters {
            debug!("[MQTT] Restoring subscription to {}", filter);
            if let Err(e) = self.client.try_subscribe(filter.as_str(), QoS::AtMostOnce) {
                warn!("[MQTT] Failed to restore subscription to {}: {}", filter, e);
            }
        }
    }
}

/// Deliver one message to every handler whose filter matches `topic`.
fn dispatch(handlers: &HandlerMap, topic: &str, payload: &[u8]) {
    let matching: Vec<MessageHandler> = handlers
        .read()
        .iter()
        .filter(|(filter, _)| topic_matches(filter, topic))
        .map(|(_, handler)| handler.clone())
        .collect();

    if matching.is_empty() {
        debug!("[MQTT] No handler for message on {}", topic);
    }
    for handler in matching {
        handler(topic, payload);
    }
}

/// Cloneable publish/subscribe handle onto an [`MqttClient`].
#[derive(Clone)]
pub struct MqttChannel {
    client: AsyncClient,
    handlers: HandlerMap,
}

impl MessageChannel for MqttChannel {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), ChannelError> {
        validate_topic(topic)?;
        debug!("[MQTT] Publishing to {}: {}", topic, payload);
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .map_err(|e| transport_error(topic, e))
    }

    fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), ChannelError> {
        validate_filter(topic)?;
        info!("[MQTT] Subscribing to topic: {}", topic);
        self.handlers.write().insert(topic.to_string(), handler);
        self.client
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| transport_error(topic, e))
    }

    fn unsubscribe(&self, topic: &str) -> Result<(), ChannelError> {
        validate_filter(topic)?;
        info!("[MQTT] Unsubscribing from topic: {}", topic);
        self.handlers.write().remove(topic);
        self.client
            .try_unsubscribe(topic)
            .map_err(|e| transport_error(topic, e))
    }
}

fn transport_error(topic: &str, e: rumqttc::ClientError) -> ChannelError {
    ChannelError::new(topic, ChannelErrorReason::Transport(e.to_string()))
}
