//! fleetcfg-core: Profile reconciliation, fleet dispatch and host enablement
//!
//! Implements the `DispatchActor` using the kameo framework, the host
//! enablement state machine, and the consumers that react to dispatcher
//! run results and inventory host events.

pub mod actor;
pub mod clock;
pub mod config;
pub mod consumer;
pub mod dispatch;
pub mod enable;
pub mod error;
pub mod message;
pub mod queue;
pub mod reconcile;
pub mod state;

pub use actor::{DispatchActor, DispatchActorArgs};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DispatchConfig, DispatchResultConfig, EnableConfig, InventoryEventConfig};
pub use consumer::{
    ConsumerStats, DispatchResultHandler, DispatchResultOutcome, InventoryEventHandler,
    InventoryOutcome, MessageHandler, run_consumer,
};
pub use dispatch::{BatchFailure, DispatchReport, FleetDispatcher, RunResult, resolve_hosts};
pub use enable::{EnableError, EnableOutcome, HostEnabler, PollPhase};
pub use error::{ConsumerError, CoreError};
pub use message::{ApplyProfile, ApplyProfileToHosts, DispatchEvent};
pub use queue::{Message, MessageReader, MessageWriter, QueueError};
pub use reconcile::{PolicyViolation, Reconciliation, reconcile};
pub use state::EnableState;
