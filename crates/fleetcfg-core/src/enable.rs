//! Host enablement
//!
//! Brings one host to the point where it can run playbooks: wait for the
//! host to be connected, then install the playbook worker through the
//! package-manager capability and wait for the worker to show up.
//!
//! Both waits poll the connector every `poll_interval` and give up after
//! `timeout`. Sleeps go through the injected [`Clock`] and race the
//! caller's [`CancellationToken`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use fleetcfg_api::Host;
use fleetcfg_client::{ClientError, ConnectionStatus, Connector, Directive};
use serde_json::json;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::clock::Clock;
use crate::config::EnableConfig;
use crate::state::EnableState;

/// Which wait ran out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// Waiting for the host to connect
    Connection,
    /// Waiting for the installed worker to be reported
    Capability,
}

impl fmt::Display for PollPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollPhase::Connection => f.write_str("connection"),
            PollPhase::Capability => f.write_str("capability"),
        }
    }
}

/// Terminal failures of an enablement run
#[derive(Error, Debug)]
pub enum EnableError {
    /// Host record lacks the org id or connector client id
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Connector query or directive failed
    #[error("connector error: {0}")]
    Connector(#[from] ClientError),

    /// A polling phase hit its ceiling
    #[error("timed out after {elapsed:?} waiting for {phase}")]
    Timeout {
        phase: PollPhase,
        elapsed: Duration,
        /// Install message, when the directive was already sent
        message_id: Option<String>,
    },

    /// Host cannot install packages
    #[error("host lacks capability {0}")]
    MissingBaseCapability(String),

    /// Host went away while the install was in flight
    #[error("host disconnected during install, message {message_id}")]
    Disconnected { message_id: String },

    /// Caller cancelled the run
    #[error("enablement cancelled")]
    Cancelled { message_id: Option<String> },
}

impl EnableError {
    /// Install message id, if the directive had been sent
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        match self {
            EnableError::Timeout { message_id, .. } | EnableError::Cancelled { message_id } => {
                message_id.as_deref()
            }
            EnableError::Disconnected { message_id } => Some(message_id),
            _ => None,
        }
    }
}

/// Successful end of an enablement run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnableOutcome {
    /// Worker was already installed, nothing sent
    AlreadyEnabled,
    /// Worker installed by the given message
    Enabled { message_id: String },
}

impl EnableOutcome {
    /// Install message id, empty when nothing was sent
    #[must_use]
    pub fn message_id(&self) -> &str {
        match self {
            EnableOutcome::AlreadyEnabled => "",
            EnableOutcome::Enabled { message_id } => message_id,
        }
    }
}

/// Current state of one run, logging every transition
struct Progress<'a> {
    host: &'a str,
    state: EnableState,
}

impl<'a> Progress<'a> {
    fn new(host: &'a str) -> Self {
        Self {
            host,
            state: EnableState::Init,
        }
    }

    fn advance(&mut self, next: EnableState) {
        debug_assert!(self.state.can_transition_to(next), "{} -> {next}", self.state);
        info!(host = %self.host, from = %self.state, to = %next, "state transition");
        self.state = next;
    }

    fn fail(&mut self, err: &EnableError) {
        error!(host = %self.host, state = %self.state, error = %err, "host enablement failed");
        self.state = EnableState::Failed;
    }
}

/// Runs host enablement against a connector
pub struct HostEnabler {
    connector: Arc<dyn Connector>,
    clock: Arc<dyn Clock>,
    config: EnableConfig,
}

impl HostEnabler {
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>, clock: Arc<dyn Clock>, config: EnableConfig) -> Self {
        Self {
            connector,
            clock,
            config,
        }
    }

    /// Enable playbook execution on `host`
    ///
    /// # Errors
    /// Returns the `EnableError` of the state the run failed in
    #[instrument(skip(self, host, cancel), fields(host = %host.id, org_id = %host.org_id))]
    pub async fn setup_host(
        &self,
        host: &Host,
        cancel: &CancellationToken,
    ) -> Result<EnableOutcome, EnableError> {
        let mut progress = Progress::new(&host.id);
        let result = self.run(&mut progress, host, cancel).await;
        if let Err(err) = &result {
            progress.fail(err);
        }
        result
    }

    async fn run(
        &self,
        progress: &mut Progress<'_>,
        host: &Host,
        cancel: &CancellationToken,
    ) -> Result<EnableOutcome, EnableError> {
        if host.org_id.is_empty() {
            return Err(EnableError::MissingField("org_id"));
        }
        let client_id = host
            .connector_id()
            .ok_or(EnableError::MissingField("rhc_client_id"))?;
        let org_id = host.org_id.as_str();

        progress.advance(EnableState::Validating);
        let mut status = self.connector.get_status(org_id, client_id).await?;

        progress.advance(EnableState::PollingConnected);
        let started = self.clock.now();
        while !status.is_connected() {
            let elapsed = self.clock.elapsed_since(started);
            if elapsed > self.config.timeout {
                return Err(EnableError::Timeout {
                    phase: PollPhase::Connection,
                    elapsed,
                    message_id: None,
                });
            }
            self.pause(cancel, None).await?;
            status = self.connector.get_status(org_id, client_id).await?;
        }

        progress.advance(EnableState::Validated);
        if !status.has_capability(&self.config.base_capability) {
            return Err(EnableError::MissingBaseCapability(
                self.config.base_capability.clone(),
            ));
        }
        if status.has_capability(&self.config.worker_capability) {
            progress.advance(EnableState::AlreadyEnabled);
            return Ok(EnableOutcome::AlreadyEnabled);
        }

        progress.advance(EnableState::Installing);
        let directive = Directive {
            org_id: org_id.to_string(),
            directive: self.config.base_capability.clone(),
            payload: json!({ "command": "install", "name": self.config.worker_capability })
                .to_string()
                .into_bytes(),
            metadata: BTreeMap::new(),
            recipient: client_id.to_string(),
        };
        let message_id = self.connector.send_directive(&directive).await?;
        info!(message_id = %message_id, "install directive sent");

        progress.advance(EnableState::PollingCapability);
        let started = self.clock.now();
        loop {
            let elapsed = self.clock.elapsed_since(started);
            if elapsed > self.config.timeout {
                return Err(EnableError::Timeout {
                    phase: PollPhase::Capability,
                    elapsed,
                    message_id: Some(message_id),
                });
            }

            let status: ConnectionStatus = self.connector.get_status(org_id, client_id).await?;
            if status.is_disconnected() {
                return Err(EnableError::Disconnected { message_id });
            }
            if status.has_capability(&self.config.worker_capability) {
                progress.advance(EnableState::Enabled);
                return Ok(EnableOutcome::Enabled { message_id });
            }

            self.pause(cancel, Some(&message_id)).await?;
        }
    }

    async fn pause(
        &self,
        cancel: &CancellationToken,
        message_id: Option<&str>,
    ) -> Result<(), EnableError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(EnableError::Cancelled {
                message_id: message_id.map(ToString::to_string),
            }),
            () = self.clock.sleep(self.config.poll_interval) => Ok(()),
        }
    }
}
