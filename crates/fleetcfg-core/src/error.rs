//! Core error types for fleetcfg-core

use thiserror::Error;

use fleetcfg_client::ClientError;
use fleetcfg_playbook::PlaybookError;
use fleetcfg_store::StoreError;

use crate::enable::EnableError;
use crate::queue::QueueError;
use crate::reconcile::PolicyViolation;

/// Errors that can occur in core operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// Profile store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Playbook could not be compiled
    #[error("playbook compilation failed: {0}")]
    Playbook(#[from] PlaybookError),

    /// Host directory, connector or dispatcher call failed
    #[error("service call failed: {0}")]
    Client(#[from] ClientError),

    /// Requested state breaks a reconciliation rule
    #[error(transparent)]
    Policy(#[from] PolicyViolation),
}

/// Errors that end the processing of one consumed message
#[derive(Error, Debug)]
pub enum ConsumerError {
    /// Required message header absent
    #[error("missing message header: {0}")]
    MissingHeader(&'static str),

    /// Required run label absent
    #[error("missing run label: {0}")]
    MissingLabel(&'static str),

    /// Message body is not the expected JSON
    #[error("cannot decode message: {0}")]
    Decode(#[from] serde_json::Error),

    /// Profile store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Host enablement failed
    #[error("host setup failed: {0}")]
    Enable(#[from] EnableError),

    /// Outbound message could not be written
    #[error("cannot publish message: {0}")]
    Publish(#[from] QueueError),

    /// Dispatch could not be scheduled
    #[error("cannot schedule dispatch: {0}")]
    Dispatch(String),
}
