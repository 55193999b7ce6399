use std::str::Utf8Error;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum PsuError {
    #[error("Configuration incomplete: {0}")]
    ConfigIncomplete(&'static str),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("Payload is not valid UTF-8: {0}")]
    Decode(#[from] Utf8Error),

    #[error("Ambiguous response format: {0}")]
    AmbiguousFormat(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PsuError>;

/// Why a publish, subscribe or unsubscribe call was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelErrorReason {
    /// Topic is the empty string.
    EmptyTopic,
    /// Topic contains characters or wildcards the operation does not allow.
    InvalidTopic(&'static str),
    /// The transport refused the request (closed, full request queue, ...).
    Transport(String),
}

impl std::fmt::Display for ChannelErrorReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTopic => write!(f, "topic is empty"),
            Self::InvalidTopic(why) => write!(f, "invalid topic ({why})"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
#[error("Channel error on topic '{topic}': {reason}")]
pub struct ChannelError {
    pub topic: String,
    pub reason: ChannelErrorReason,
}

impl ChannelError {
    pub fn new(topic: impl Into<String>, reason: ChannelErrorReason) -> Self {
        Self {
            topic: topic.into(),
            reason,
        }
    }

    pub fn empty_topic() -> Self {
        Self::new("", ChannelErrorReason::EmptyTopic)
    }
}
