//! Completion consumers
//!
//! [`run_consumer`] reads messages one at a time and hands each to its own
//! task, so a slow or failing handler never holds up ingestion. Handler
//! errors end only their own message.

pub mod dispatcher;
pub mod inventory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ConsumerError;
use crate::queue::{Message, MessageReader, QueueError};

pub use dispatcher::{DispatchResultHandler, DispatchResultOutcome};
pub use inventory::{InventoryEventHandler, InventoryOutcome};

/// Processes one consumed message
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    type Outcome: fmt::Debug + Send + 'static;

    /// Name used in logs
    fn name(&self) -> &'static str;

    async fn handle(&self, message: Message) -> Result<Self::Outcome, ConsumerError>;
}

/// Counters of one consumer run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub read: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Frames the reader could not decode
    pub rejected: usize,
}

impl ConsumerStats {
    fn record(&mut self, joined: Result<bool, JoinError>) {
        match joined {
            Ok(true) => self.succeeded += 1,
            Ok(false) => self.failed += 1,
            Err(e) => {
                error!(error = %e, "message handler task died");
                self.failed += 1;
            }
        }
    }
}

/// Consume until the reader is exhausted or `cancel` fires, then drain
/// in-flight handlers
pub async fn run_consumer<R, H>(
    mut reader: R,
    handler: Arc<H>,
    cancel: CancellationToken,
) -> ConsumerStats
where
    R: MessageReader,
    H: MessageHandler,
{
    let name = handler.name();
    info!(consumer = name, "consumer started");

    let mut stats = ConsumerStats::default();
    let mut tasks = JoinSet::new();

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(consumer = name, "consumer cancelled");
                break;
            }
            next = reader.read_message() => next,
        };

        match next {
            Ok(Some(message)) => {
                stats.read += 1;
                let handler = Arc::clone(&handler);
                tasks.spawn(async move {
                    let topic = message.topic.clone();
                    match handler.handle(message).await {
                        Ok(outcome) => {
                            debug!(consumer = handler.name(), %topic, ?outcome, "message handled");
                            true
                        }
                        Err(e) => {
                            error!(consumer = handler.name(), %topic, error = %e, "message handling failed");
                            false
                        }
                    }
                });
            }
            Ok(None) => {
                info!(consumer = name, "message source exhausted");
                break;
            }
            Err(e @ (QueueError::Json(_) | QueueError::Decode(_))) => {
                stats.rejected += 1;
                warn!(consumer = name, error = %e, "skipping unreadable message");
            }
            Err(e) => {
                error!(consumer = name, error = %e, "message source failed");
                break;
            }
        }

        while let Some(joined) = tasks.try_join_next() {
            stats.record(joined);
        }
    }

    while let Some(joined) = tasks.join_next().await {
        stats.record(joined);
    }

    info!(
        consumer = name,
        read = stats.read,
        succeeded = stats.succeeded,
        failed = stats.failed,
        rejected = stats.rejected,
        "consumer stopped"
    );
    stats
}
