//! Publish/subscribe channel abstraction.
//!
//! The PSU controller only ever talks to the transport through
//! [`MessageChannel`], so it can be driven by the MQTT adapter in
//! production and by an in-memory fake in tests.

use crate::error::{ChannelError, ChannelErrorReason};
use std::sync::Arc;

/// Callback invoked for every message delivered on a subscribed topic.
///
/// Arguments are the concrete topic the message arrived on and the raw
/// payload bytes. May be called from a transport thread.
pub type MessageHandler = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

/// Messaging collaborator used by the PSU controller.
///
/// Implementations must not block: requests are queued or rejected
/// immediately.
pub trait MessageChannel: Send + Sync {
    /// Publish `payload` on `topic`.
    fn publish(&self, topic: &str, payload: &str) -> Result<(), ChannelError>;

    /// Subscribe `handler` to `topic` (an MQTT topic filter).
    fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), ChannelError>;

    /// Drop the subscription for `topic`.
    fn unsubscribe(&self, topic: &str) -> Result<(), ChannelError>;
}

/// Check that `topic` is usable as a publish topic.
pub fn validate_topic(topic: &str) -> Result<(), ChannelError> {
    if topic.is_empty() {
        return Err(ChannelError::empty_topic());
    }
    if topic.contains('\0') {
        return Err(invalid(topic, "contains NUL"));
    }
    if topic.contains(['+', '#']) {
        return Err(invalid(topic, "wildcards are not allowed when publishing"));
    }
    Ok(())
}

/// Check that `filter` is usable as a subscription filter.
pub fn validate_filter(filter: &str) -> Result<(), ChannelError> {
    if filter.is_empty() {
        return Err(ChannelError::empty_topic());
    }
    if filter.contains('\0') {
        return Err(invalid(filter, "contains NUL"));
    }

    let levels: Vec<&str> = filter.split('/').collect();
    let last = levels.len() - 1;
    for (i, level) in levels.iter().enumerate() {
        if level.contains('#') && (*level != "#" || i != last) {
            return Err(invalid(filter, "'#' must be the whole last level"));
        }
        if level.contains('+') && *level != "+" {
            return Err(invalid(filter, "'+' must occupy a whole level"));
        }
    }
    Ok(())
}

/// MQTT filter matching (`+` single level, `#` trailing multi level).
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

fn invalid(topic: &str, why: &'static str) -> ChannelError {
    ChannelError::new(topic, ChannelErrorReason::InvalidTopic(why))
}
