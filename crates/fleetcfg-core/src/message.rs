//! Message types for actor communication
//!
//! Message handlers are implemented in their respective actor modules.

use fleetcfg_api::{Host, Profile};
use fleetcfg_client::OrgContext;
use kameo_macros::Reply;
use uuid::Uuid;

use crate::dispatch::DispatchReport;

// ============================================================================
// DispatchActor Messages
// ============================================================================

/// Apply a profile to every connector-enabled host of its organization
#[derive(Debug, Clone)]
pub struct ApplyProfile {
    pub profile: Profile,
    /// Caller context used to list the hosts
    pub org: OrgContext,
}

/// Apply a profile to the given hosts only
#[derive(Debug, Clone)]
pub struct ApplyProfileToHosts {
    pub profile: Profile,
    pub hosts: Vec<Host>,
}

/// How one dispatch request ended; also broadcast to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Reply)]
pub enum DispatchEvent {
    /// Profile is inactive, nothing was sent
    Skipped { profile_id: Uuid },
    /// Runs were submitted; per-host outcomes are in the report
    Completed(DispatchReport),
    /// Host resolution or playbook compilation failed
    Failed { profile_id: Uuid, error: String },
}

impl DispatchEvent {
    #[must_use]
    pub fn profile_id(&self) -> Uuid {
        match self {
            DispatchEvent::Skipped { profile_id } | DispatchEvent::Failed { profile_id, .. } => {
                *profile_id
            }
            DispatchEvent::Completed(report) => report.profile_id,
        }
    }
}
