//! `DispatchActor`: background profile dispatch
//!
//! Owns the fleet dispatcher and the host directory. HTTP handlers and the
//! inventory consumer `tell` it to apply a profile and return immediately;
//! tests `ask` it and get the outcome back. Every outcome is also broadcast.

use std::sync::Arc;

use fleetcfg_api::{Host, Profile};
use fleetcfg_client::HostDirectory;
use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::ActorStopReason;
use kameo::message::{Context, Message};
use kameo::prelude::*;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::dispatch::{FleetDispatcher, resolve_hosts};
use crate::error::CoreError;
use crate::message::{ApplyProfile, ApplyProfileToHosts, DispatchEvent};

/// Arguments for spawning a `DispatchActor`
pub struct DispatchActorArgs {
    pub dispatcher: FleetDispatcher,
    /// Source of the organization's hosts for [`ApplyProfile`]
    pub directory: Arc<dyn HostDirectory>,
    /// Receives every [`DispatchEvent`]
    pub event_tx: broadcast::Sender<DispatchEvent>,
}

/// Runs profile dispatches one at a time
pub struct DispatchActor {
    dispatcher: FleetDispatcher,
    directory: Arc<dyn HostDirectory>,
    event_tx: broadcast::Sender<DispatchEvent>,
    completed: u64,
}

impl DispatchActor {
    /// Spawn with an unbounded mailbox
    ///
    /// Callers `tell(..).try_send()`, which never waits on a backlog of slow
    /// dispatches.
    pub fn start(args: DispatchActorArgs) -> ActorRef<Self> {
        Self::spawn_with_mailbox(args, mailbox::unbounded())
    }

    async fn apply(
        &mut self,
        profile: &Profile,
        hosts: Result<Vec<Host>, CoreError>,
    ) -> DispatchEvent {
        let event = match hosts {
            Ok(hosts) => match self.dispatcher.dispatch(profile, &hosts).await {
                Ok(report) => DispatchEvent::Completed(report),
                Err(e) => failed(profile, &e),
            },
            Err(e) => failed(profile, &e),
        };
        self.completed += 1;
        // No subscribers is fine
        let _ = self.event_tx.send(event.clone());
        event
    }

    fn skip_inactive(&self, profile: &Profile) -> Option<DispatchEvent> {
        if profile.active {
            return None;
        }
        info!(profile_id = %profile.id, "profile inactive, not dispatching");
        let event = DispatchEvent::Skipped {
            profile_id: profile.id,
        };
        let _ = self.event_tx.send(event.clone());
        Some(event)
    }
}

fn failed(profile: &Profile, err: &CoreError) -> DispatchEvent {
    error!(profile_id = %profile.id, org_id = %profile.org_id, error = %err, "dispatch failed");
    DispatchEvent::Failed {
        profile_id: profile.id,
        error: err.to_string(),
    }
}

impl Actor for DispatchActor {
    type Args = DispatchActorArgs;
    type Error = CoreError;

    async fn on_start(args: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        info!(id = %actor_ref.id(), "DispatchActor starting");

        Ok(Self {
            dispatcher: args.dispatcher,
            directory: args.directory,
            event_tx: args.event_tx,
            completed: 0,
        })
    }

    async fn on_stop(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        reason: ActorStopReason,
    ) -> Result<(), Self::Error> {
        info!(reason = ?reason, completed = self.completed, "DispatchActor stopping");
        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<ApplyProfile> for DispatchActor {
    type Reply = DispatchEvent;

    async fn handle(
        &mut self,
        msg: ApplyProfile,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if let Some(skipped) = self.skip_inactive(&msg.profile) {
            return skipped;
        }
        let hosts = resolve_hosts(self.directory.as_ref(), &msg.org).await;
        self.apply(&msg.profile, hosts).await
    }
}

impl Message<ApplyProfileToHosts> for DispatchActor {
    type Reply = DispatchEvent;

    async fn handle(
        &mut self,
        msg: ApplyProfileToHosts,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if let Some(skipped) = self.skip_inactive(&msg.profile) {
            return skipped;
        }
        self.apply(&msg.profile, Ok(msg.hosts)).await
    }
}
