//! Host enablement state machine types

use std::fmt;

/// States of one host enablement run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableState {
    Init,
    Validating,
    PollingConnected,
    Validated,
    AlreadyEnabled,
    Installing,
    PollingCapability,
    Enabled,
    Failed,
}

impl EnableState {
    /// Whether `next` may follow `self`
    #[must_use]
    pub fn can_transition_to(self, next: EnableState) -> bool {
        use EnableState::{
            AlreadyEnabled, Enabled, Failed, Init, Installing, PollingCapability,
            PollingConnected, Validated, Validating,
        };

        matches!(
            (self, next),
            (Init, Validating)
                | (Validating, PollingConnected)
                | (PollingConnected, Validated)
                | (Validated, AlreadyEnabled | Installing)
                | (Installing, PollingCapability)
                | (PollingCapability, Enabled)
        ) || (next == Failed && !self.is_terminal())
    }

    /// Whether the run is over
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EnableState::AlreadyEnabled | EnableState::Enabled | EnableState::Failed
        )
    }
}

impl fmt::Display for EnableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnableState::Init => "init",
            EnableState::Validating => "validating",
            EnableState::PollingConnected => "polling_connected",
            EnableState::Validated => "validated",
            EnableState::AlreadyEnabled => "already_enabled",
            EnableState::Installing => "installing",
            EnableState::PollingCapability => "polling_capability",
            EnableState::Enabled => "enabled",
            EnableState::Failed => "failed",
        };
        f.write_str(name)
    }
}
