//! Dispatcher run-result consumer
//!
//! Runs tagged for this service that finished with `success` are reported to
//! the inventory service as the host's applied profile.

use std::sync::Arc;

use async_trait::async_trait;
use fleetcfg_api::events::{
    AppliedState, DispatcherEvent, InventoryUpdate, InventoryUpdateData, LABEL_HOST_ID,
    LABEL_STATE_ID, PlatformMetadata,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::MessageHandler;
use crate::config::DispatchResultConfig;
use crate::error::ConsumerError;
use crate::queue::{Message, MessageWriter};

/// Header naming the service that started the run
pub const SERVICE_HEADER: &str = "service";

/// Operation of published inventory updates
pub const UPDATE_OPERATION: &str = "add_host";

/// What happened to one run-result message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResultOutcome {
    /// Run belongs to another service
    Ignored,
    /// Inventory update published
    Published {
        host_id: String,
        profile_id: String,
        request_id: String,
    },
    Running,
    /// Failed, timed out or unknown status; logged only
    Unhandled { status: String },
}

/// Handles dispatcher run results
pub struct DispatchResultHandler {
    writer: Arc<dyn MessageWriter>,
    config: DispatchResultConfig,
}

impl DispatchResultHandler {
    #[must_use]
    pub fn new(writer: Arc<dyn MessageWriter>, config: DispatchResultConfig) -> Self {
        Self { writer, config }
    }

    fn update_message(
        &self,
        event: &DispatcherEvent,
        host_id: &str,
        profile_id: &str,
        request_id: &str,
    ) -> Result<Message, ConsumerError> {
        let update = InventoryUpdate {
            operation: UPDATE_OPERATION.to_string(),
            platform_metadata: PlatformMetadata {
                request_id: request_id.to_string(),
            },
            data: InventoryUpdateData {
                id: host_id.to_string(),
                org_id: event.payload.org_id.clone(),
                system_profile: AppliedState {
                    rhc_config_state: profile_id.to_string(),
                },
            },
        };
        Ok(Message::new(&self.config.update_topic, serde_json::to_vec(&update)?)
            .with_key(format!("{}-{host_id}", self.config.key_prefix)))
    }
}

#[async_trait]
impl MessageHandler for DispatchResultHandler {
    type Outcome = DispatchResultOutcome;

    fn name(&self) -> &'static str {
        "dispatcher-consumer"
    }

    #[instrument(skip(self, message), fields(topic = %message.topic))]
    async fn handle(&self, message: Message) -> Result<Self::Outcome, ConsumerError> {
        let service = message
            .header(SERVICE_HEADER)
            .ok_or(ConsumerError::MissingHeader(SERVICE_HEADER))?;
        if service != self.config.service_name {
            return Ok(DispatchResultOutcome::Ignored);
        }

        let event: DispatcherEvent = serde_json::from_slice(&message.value)?;
        let recipient = event.payload.recipient.as_str();

        match event.payload.status.as_str() {
            "success" => {
                let host_id = event
                    .payload
                    .labels
                    .get(LABEL_HOST_ID)
                    .ok_or(ConsumerError::MissingLabel(LABEL_HOST_ID))?;
                let profile_id = event
                    .payload
                    .labels
                    .get(LABEL_STATE_ID)
                    .ok_or(ConsumerError::MissingLabel(LABEL_STATE_ID))?;
                let request_id = Uuid::new_v4().to_string();

                let update = self.update_message(&event, host_id, profile_id, &request_id)?;
                self.writer.write_message(update).await?;
                info!(
                    %recipient,
                    host = %host_id,
                    profile_id = %profile_id,
                    request_id = %request_id,
                    "run succeeded, inventory update published"
                );

                Ok(DispatchResultOutcome::Published {
                    host_id: host_id.clone(),
                    profile_id: profile_id.clone(),
                    request_id,
                })
            }
            "running" => {
                info!(%recipient, "run in progress");
                Ok(DispatchResultOutcome::Running)
            }
            status => {
                warn!(%recipient, %status, "run did not succeed");
                Ok(DispatchResultOutcome::Unhandled {
                    status: status.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::queue::channel::{ChannelReader, channel};

    fn handler() -> (DispatchResultHandler, ChannelReader) {
        let (writer, reader) = channel(8);
        (
            DispatchResultHandler::new(Arc::new(writer), DispatchResultConfig::default()),
            reader,
        )
    }

    fn run_result(service: &str, status: &str) -> Message {
        let body = json!({
            "event_type": "update",
            "payload": {
                "id": "run-1",
                "org_id": "org-1",
                "recipient": "client-1",
                "service": service,
                "labels": {"id": "host-1", "state_id": "3d1c6e0e-0000-4000-8000-000000000001"},
                "status": status,
            }
        });
        Message::new("platform.playbook-dispatcher.runs", body.to_string().into_bytes())
            .with_header(SERVICE_HEADER, service)
    }

    #[tokio::test]
    async fn test_success_publishes_inventory_update() {
        let (handler, mut reader) = handler();

        let outcome = handler
            .handle(run_result("config_manager", "success"))
            .await
            .unwrap();

        let DispatchResultOutcome::Published { host_id, request_id, .. } = outcome else {
            panic!("expected publish, got {outcome:?}");
        };
        assert_eq!(host_id, "host-1");

        let published = reader.drain();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "platform.inventory.system-profile");
        assert_eq!(published[0].key.as_deref(), Some("cm-host-1"));
        let update: InventoryUpdate = serde_json::from_slice(&published[0].value).unwrap();
        assert_eq!(update.operation, UPDATE_OPERATION);
        assert_eq!(update.platform_metadata.request_id, request_id);
        assert_eq!(update.data.org_id, "org-1");
        assert_eq!(
            update.data.system_profile.rhc_config_state,
            "3d1c6e0e-0000-4000-8000-000000000001"
        );
    }

    #[tokio::test]
    async fn test_other_service_is_ignored_before_decoding() {
        let (handler, mut reader) = handler();
        let message = Message::new("runs", b"not json".to_vec()).with_header(SERVICE_HEADER, "remediations");

        let outcome = handler.handle(message).await.unwrap();

        assert_eq!(outcome, DispatchResultOutcome::Ignored);
        assert!(reader.drain().is_empty());
    }

    #[tokio::test]
    async fn test_running_and_failure_publish_nothing() {
        let (handler, mut reader) = handler();

        let running = handler.handle(run_result("config_manager", "running")).await.unwrap();
        let failure = handler.handle(run_result("config_manager", "timeout")).await.unwrap();

        assert_eq!(running, DispatchResultOutcome::Running);
        assert_eq!(failure, DispatchResultOutcome::Unhandled { status: "timeout".to_string() });
        assert!(reader.drain().is_empty());
    }

    #[tokio::test]
    async fn test_missing_header_and_label_are_errors() {
        let (handler, _reader) = handler();

        let err = handler.handle(Message::new("runs", b"{}".to_vec())).await.unwrap_err();
        assert!(matches!(err, ConsumerError::MissingHeader(SERVICE_HEADER)));

        let body = json!({"payload": {"status": "success", "labels": {"id": "host-1"}}});
        let message = Message::new("runs", body.to_string().into_bytes())
            .with_header(SERVICE_HEADER, "config_manager");
        let err = handler.handle(message).await.unwrap_err();
        assert!(matches!(err, ConsumerError::MissingLabel(LABEL_STATE_ID)));
    }
}
