//! Message-queue seam
//!
//! Consumers read [`Message`]s from a [`MessageReader`] and publish through a
//! [`MessageWriter`]. The broker itself stays outside this crate; [`channel`]
//! and [`ndjson`] are the built-in adapters.

pub mod channel;
pub mod ndjson;

use async_trait::async_trait;
use thiserror::Error;

pub use channel::{ChannelReader, ChannelWriter};
pub use ndjson::{LineReader, LineWriter};

/// Queue adapter errors
#[derive(Error, Debug)]
pub enum QueueError {
    /// The other end went away
    #[error("queue closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A frame could not be turned into a message
    #[error("cannot decode frame: {0}")]
    Decode(String),
}

/// One queue message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub key: Option<String>,
    /// Header pairs in wire order
    pub headers: Vec<(String, String)>,
    pub value: Vec<u8>,
}

impl Message {
    #[must_use]
    pub fn new(topic: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First value of header `name`
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Source of consumed messages
#[async_trait]
pub trait MessageReader: Send {
    /// Next message, `None` once the source is exhausted
    async fn read_message(&mut self) -> Result<Option<Message>, QueueError>;
}

/// Sink for published messages
#[async_trait]
pub trait MessageWriter: Send + Sync {
    async fn write_message(&self, message: Message) -> Result<(), QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_takes_first() {
        let message = Message::new("t", b"{}".to_vec())
            .with_header("service", "config_manager")
            .with_header("service", "other");

        assert_eq!(message.header("service"), Some("config_manager"));
        assert_eq!(message.header("event_type"), None);
    }
}
