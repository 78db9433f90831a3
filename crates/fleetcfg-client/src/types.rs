//! Request and response types of the external services

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fleetcfg_api::Host;

/// Organization on whose behalf a call is made
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrgContext {
    pub org_id: String,
    /// Legacy account number
    pub account_id: Option<String>,
    /// Caller identity header, forwarded verbatim to the inventory service
    pub identity: Option<String>,
}

impl OrgContext {
    #[must_use]
    pub fn new(org_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_account(mut self, account_id: Option<String>) -> Self {
        self.account_id = account_id;
        self
    }

    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }
}

/// One page of the host listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPage {
    pub total: u64,
    pub count: u64,
    pub page: u64,
    pub per_page: u64,
    #[serde(default)]
    pub results: Vec<Host>,
}

/// Connector view of a host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// `connected`, `disconnected`, ...
    pub status: String,
    /// Capabilities the host advertises, keyed by name
    #[serde(default)]
    pub dispatchers: BTreeMap<String, serde_json::Value>,
}

impl ConnectionStatus {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == "connected"
    }

    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.status == "disconnected"
    }

    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.dispatchers.contains_key(name)
    }
}

/// Message routed by the connector to one capability of a host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub org_id: String,
    /// Target capability, e.g. `package-manager`
    pub directive: String,
    /// JSON-encoded payload
    pub payload: Vec<u8>,
    pub metadata: BTreeMap<String, String>,
    /// Connector client id of the host
    pub recipient: String,
}

/// One playbook run to start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInput {
    /// Connector client id of the host
    pub recipient: String,
    pub org_id: String,
    /// Where the host fetches the playbook
    pub url: String,
    pub labels: BTreeMap<String, String>,
}

/// Dispatcher answer for one [`RunInput`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCreated {
    pub code: u16,
    /// Run id, absent when the run was rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl RunCreated {
    /// Whether the dispatcher accepted the run
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.id.is_some() && (200..300).contains(&self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_status_capabilities() {
        let status: ConnectionStatus = serde_json::from_str(
            r#"{"status":"connected","dispatchers":{"package-manager":{},"rhc-worker-playbook":{"version":"0.2"}}}"#,
        )
        .unwrap();

        assert!(status.is_connected());
        assert!(status.has_capability("package-manager"));
        assert!(status.has_capability("rhc-worker-playbook"));
        assert!(!status.has_capability("other"));
    }

    #[test]
    fn test_run_created_rejection() {
        let rejected: RunCreated = serde_json::from_str(r#"{"code":404}"#).unwrap();
        assert!(!rejected.is_accepted());

        let accepted: RunCreated = serde_json::from_str(r#"{"code":201,"id":"run-1"}"#).unwrap();
        assert!(accepted.is_accepted());
    }
}
