//! Topic router between one message source and the consumer queues
//!
//! The daemon reads a single stream (stdin NDJSON by default) and hands each
//! message to the in-process queue of the consumer subscribed to its topic.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use fleetcfg_core::queue::{ChannelWriter, MessageReader, MessageWriter, QueueError};

/// Counters of one bridge run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub routed: usize,
    /// Messages on topics nobody subscribed to
    pub unrouted: usize,
    pub malformed: usize,
}

/// Topic to consumer queue mapping
#[derive(Debug, Default)]
pub struct TopicRouter {
    routes: HashMap<String, ChannelWriter>,
}

impl TopicRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Send messages on `topic` to `writer`
    pub fn subscribe(&mut self, topic: impl Into<String>, writer: ChannelWriter) {
        self.routes.insert(topic.into(), writer);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Route until the source ends or `cancel` fires
    ///
    /// Consumer queues close when this returns, so their loops drain and end.
    pub async fn run<R>(mut self, mut reader: R, cancel: CancellationToken) -> BridgeStats
    where
        R: MessageReader,
    {
        let mut stats = BridgeStats::default();
        info!(topics = self.routes.len(), "queue bridge started");

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                next = reader.read_message() => next,
            };

            match next {
                Ok(Some(message)) => {
                    let Some(writer) = self.routes.get(&message.topic) else {
                        debug!(topic = %message.topic, "no consumer for topic");
                        stats.unrouted += 1;
                        continue;
                    };
                    let topic = message.topic.clone();
                    if writer.write_message(message).await.is_err() {
                        warn!(%topic, "consumer queue closed, unsubscribing");
                        self.routes.remove(&topic);
                        if self.routes.is_empty() {
                            break;
                        }
                        continue;
                    }
                    stats.routed += 1;
                }
                Ok(None) => break,
                Err(e @ (QueueError::Json(_) | QueueError::Decode(_))) => {
                    warn!(error = %e, "skipping malformed line");
                    stats.malformed += 1;
                }
                Err(e) => {
                    error!(error = %e, "message source failed");
                    break;
                }
            }
        }

        info!(
            routed = stats.routed,
            unrouted = stats.unrouted,
            malformed = stats.malformed,
            "queue bridge stopped"
        );
        stats
    }
}
