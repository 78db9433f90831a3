//! In-process queue over a tokio mpsc channel

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Message, MessageReader, MessageWriter, QueueError};

/// Create a bounded in-process queue
#[must_use]
pub fn channel(capacity: usize) -> (ChannelWriter, ChannelReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelWriter { tx }, ChannelReader { rx })
}

/// Writing half; cloneable
#[derive(Debug, Clone)]
pub struct ChannelWriter {
    tx: mpsc::Sender<Message>,
}

/// Reading half; exhausted once every writer is dropped
#[derive(Debug)]
pub struct ChannelReader {
    rx: mpsc::Receiver<Message>,
}

impl ChannelReader {
    /// Take whatever is queued right now without waiting
    pub fn drain(&mut self) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        messages
    }
}

#[async_trait]
impl MessageReader for ChannelReader {
    async fn read_message(&mut self) -> Result<Option<Message>, QueueError> {
        Ok(self.rx.recv().await)
    }
}

#[async_trait]
impl MessageWriter for ChannelWriter {
    async fn write_message(&self, message: Message) -> Result<(), QueueError> {
        self.tx.send(message).await.map_err(|_| QueueError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reader_ends_when_writers_drop() {
        let (writer, mut reader) = channel(4);
        writer.write_message(Message::new("a", Vec::new())).await.unwrap();
        drop(writer);

        assert_eq!(reader.read_message().await.unwrap().unwrap().topic, "a");
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_after_reader_drop_is_closed() {
        let (writer, reader) = channel(1);
        drop(reader);

        let err = writer.write_message(Message::default()).await.unwrap_err();
        assert!(matches!(err, QueueError::Closed));
    }
}
