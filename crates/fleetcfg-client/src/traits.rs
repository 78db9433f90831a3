//! Capability traits for the external services

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ConnectionStatus, Directive, HostPage, OrgContext, RunCreated, RunInput};

/// Paginated, read-only host listing
#[async_trait]
pub trait HostDirectory: Send + Sync {
    /// Fetch page `page` (1-based) of the organization's connector-enabled hosts
    async fn list(&self, org: &OrgContext, page: u64) -> Result<HostPage>;
}

/// Device connectivity broker
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connection status and capabilities of one host
    async fn get_status(&self, org_id: &str, host_id: &str) -> Result<ConnectionStatus>;

    /// Send a directive to a host capability, returning the message id
    async fn send_directive(&self, directive: &Directive) -> Result<String>;
}

/// Playbook run dispatcher
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Start one run per input; results come back in input order
    async fn submit(&self, batch: &[RunInput]) -> Result<Vec<RunCreated>>;
}
