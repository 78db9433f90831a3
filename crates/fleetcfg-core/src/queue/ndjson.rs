//! Newline-delimited JSON envelopes over any async byte stream
//!
//! Each line is `{"topic","key","headers":{..},"value":<json>}`, which lets a
//! broker command-line client be piped straight into the daemon.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use super::{Message, MessageReader, MessageWriter, QueueError};

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    value: Value,
}

impl Envelope {
    fn into_message(self) -> Result<Message, QueueError> {
        Ok(Message {
            topic: self.topic,
            key: self.key,
            headers: self.headers.into_iter().collect(),
            value: serde_json::to_vec(&self.value)?,
        })
    }

    fn from_message(message: Message) -> Self {
        // Non-JSON payloads travel as a JSON string
        let value = serde_json::from_slice(&message.value).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&message.value).into_owned())
        });
        Self {
            topic: message.topic,
            key: message.key,
            headers: message.headers.into_iter().collect(),
            value,
        }
    }
}

/// Reads one envelope per line
pub struct LineReader<R> {
    inner: R,
    line: String,
}

impl<R> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: String::new(),
        }
    }
}

#[async_trait]
impl<R> MessageReader for LineReader<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn read_message(&mut self) -> Result<Option<Message>, QueueError> {
        loop {
            self.line.clear();
            if self.inner.read_line(&mut self.line).await? == 0 {
                return Ok(None);
            }
            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }
            let envelope: Envelope = serde_json::from_str(line)?;
            if envelope.topic.is_empty() {
                return Err(QueueError::Decode("envelope without topic".to_string()));
            }
            return envelope.into_message().map(Some);
        }
    }
}

/// Writes one envelope per line, flushing after each
pub struct LineWriter<W> {
    inner: Mutex<W>,
}

impl<W> LineWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Give back the wrapped stream
    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

#[async_trait]
impl<W> MessageWriter for LineWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_message(&self, message: Message) -> Result<(), QueueError> {
        let mut line = serde_json::to_vec(&Envelope::from_message(message))?;
        line.push(b'\n');
        let mut inner = self.inner.lock().await;
        inner.write_all(&line).await?;
        inner.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_envelopes_and_skips_blank_lines() {
        let input = concat!(
            r#"{"topic":"platform.inventory.events","headers":{"event_type":"created"},"value":{"type":"created"}}"#,
            "\n\n",
            r#"{"topic":"t2","key":"k","value":"plain"}"#,
            "\n",
        );
        let mut reader = LineReader::new(input.as_bytes());

        let first = reader.read_message().await.unwrap().unwrap();
        assert_eq!(first.topic, "platform.inventory.events");
        assert_eq!(first.header("event_type"), Some("created"));
        let body: Value = serde_json::from_slice(&first.value).unwrap();
        assert_eq!(body["type"], "created");

        let second = reader.read_message().await.unwrap().unwrap();
        assert_eq!(second.key.as_deref(), Some("k"));
        assert_eq!(second.value, br#""plain""#.to_vec());

        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_line_is_error_then_reading_continues() {
        let input = "not json\n{\"topic\":\"t\",\"value\":1}\n";
        let mut reader = LineReader::new(input.as_bytes());

        assert!(matches!(reader.read_message().await, Err(QueueError::Json(_))));
        assert_eq!(reader.read_message().await.unwrap().unwrap().topic, "t");
    }

    #[tokio::test]
    async fn test_writer_emits_one_line_per_message() {
        let writer = LineWriter::new(Vec::new());
        writer
            .write_message(Message::new("out", br#"{"operation":""}"#.to_vec()).with_key("cm-h1"))
            .await
            .unwrap();
        writer
            .write_message(Message::new("out", b"raw".to_vec()))
            .await
            .unwrap();

        let output = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<Value> = output
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["key"], "cm-h1");
        assert_eq!(lines[0]["value"]["operation"], "");
        assert_eq!(lines[1]["value"], "raw");
    }
}
