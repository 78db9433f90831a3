//! Inventory host-event consumer
//!
//! For connector-enabled hosts that were created or updated: make sure the
//! organization has a current profile, set new hosts up for playbook runs,
//! and dispatch the current profile to hosts reporting a different one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleetcfg_api::Profile;
use fleetcfg_api::events::InventoryEvent;
use fleetcfg_store::ProfileStore;
use kameo::actor::ActorRef;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, info, instrument, warn};
use uuid::Uuid;

use super::MessageHandler;
use crate::actor::DispatchActor;
use crate::clock::Clock;
use crate::config::InventoryEventConfig;
use crate::enable::HostEnabler;
use crate::error::ConsumerError;
use crate::message::ApplyProfileToHosts;
use crate::queue::Message;

/// Header carrying the event type
pub const EVENT_TYPE_HEADER: &str = "event_type";
/// Header carrying the caller's request id
pub const REQUEST_ID_HEADER: &str = "request_id";

const CREATED: &str = "created";
const UPDATED: &str = "updated";

/// What happened to one inventory event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryOutcome {
    /// Not a created/updated event, or the host lacks an organization or connector
    Ignored { reason: &'static str },
    /// Older than the staleness threshold
    Stale { age: Duration },
    /// Current profile ensured; `dispatched` when a convergence run was submitted
    Processed { profile_id: Uuid, dispatched: bool },
}

/// Handles inventory host events
pub struct InventoryEventHandler {
    store: Arc<dyn ProfileStore>,
    clock: Arc<dyn Clock>,
    config: InventoryEventConfig,
    enabler: Option<Arc<HostEnabler>>,
    dispatch: Option<ActorRef<DispatchActor>>,
    cancel: CancellationToken,
}

impl InventoryEventHandler {
    /// Handler that only ensures current profiles
    #[must_use]
    pub fn new(
        store: Arc<dyn ProfileStore>,
        clock: Arc<dyn Clock>,
        config: InventoryEventConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config,
            enabler: None,
            dispatch: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Run enablement for created hosts; `cancel` aborts in-flight polling
    #[must_use]
    pub fn with_enabler(mut self, enabler: Arc<HostEnabler>, cancel: CancellationToken) -> Self {
        self.enabler = Some(enabler);
        self.cancel = cancel;
        self
    }

    /// Submit convergence dispatches to `actor`
    #[must_use]
    pub fn with_dispatch(mut self, actor: ActorRef<DispatchActor>) -> Self {
        self.dispatch = Some(actor);
        self
    }

    fn age_of(&self, event: &InventoryEvent) -> Duration {
        self.clock.elapsed_since(event.timestamp)
    }
}

#[async_trait]
impl MessageHandler for InventoryEventHandler {
    type Outcome = InventoryOutcome;

    fn name(&self) -> &'static str {
        "inventory-consumer"
    }

    #[instrument(skip(self, message), fields(topic = %message.topic, request_id = tracing::field::Empty))]
    async fn handle(&self, message: Message) -> Result<Self::Outcome, ConsumerError> {
        let event_type = message
            .header(EVENT_TYPE_HEADER)
            .ok_or(ConsumerError::MissingHeader(EVENT_TYPE_HEADER))?;
        if event_type != CREATED && event_type != UPDATED {
            return Ok(InventoryOutcome::Ignored {
                reason: "event type",
            });
        }

        let event: InventoryEvent = serde_json::from_slice(&message.value)?;
        let host = &event.host;
        if host.org_id.is_empty() {
            warn!(host = %host.id, "host event without organization");
            return Ok(InventoryOutcome::Ignored {
                reason: "no organization",
            });
        }
        if host.connector_id().is_none() {
            debug!(host = %host.id, "host has no connector client id");
            return Ok(InventoryOutcome::Ignored {
                reason: "no connector",
            });
        }

        let age = self.age_of(&event);
        if age > self.config.stale_after {
            info!(host = %host.id, age_secs = age.as_secs(), "dropping stale event");
            return Ok(InventoryOutcome::Stale { age });
        }

        let request_id = message
            .header(REQUEST_ID_HEADER)
            .map_or_else(|| Uuid::new_v4().to_string(), ToString::to_string);
        Span::current().record("request_id", request_id.as_str());

        let template = Profile::new(
            host.org_id.clone(),
            host.account.clone(),
            &self.config.default_state,
        );
        let profile = self
            .store
            .get_or_insert_current(&host.org_id, template)
            .await?;

        if event_type == CREATED
            && self.config.enable_on_create
            && let Some(enabler) = &self.enabler
        {
            info!(host = %host.id, "new host detected, setting up for playbook execution");
            let outcome = enabler.setup_host(host, &self.cancel).await?;
            info!(host = %host.id, message_id = outcome.message_id(), "host setup finished");
        }

        let reported = host.config_state().unwrap_or_default();
        let profile_id = profile.id;
        let stale_profile = reported != profile_id.to_string();

        let dispatched = match &self.dispatch {
            Some(actor) if self.config.converge && profile.active && stale_profile => {
                info!(
                    host = %host.id,
                    reported,
                    %profile_id,
                    "host reports another profile, dispatching current one"
                );
                actor
                    .tell(ApplyProfileToHosts {
                        profile,
                        hosts: vec![event.host.clone()],
                    })
                    .try_send()
                    .map_err(|e| ConsumerError::Dispatch(e.to_string()))?;
                true
            }
            _ => {
                debug!(host = %host.id, %profile_id, stale_profile, "no dispatch needed");
                false
            }
        };

        Ok(InventoryOutcome::Processed {
            profile_id,
            dispatched,
        })
    }
}
