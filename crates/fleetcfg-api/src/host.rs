//! Host records as reported by the inventory service

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A fleet host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Host {
    /// Inventory host id
    pub id: String,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub org_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub reporter: Option<String>,
    #[serde(default)]
    pub system_profile: SystemProfile,
}

/// Connector-related subset of the host's system profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SystemProfile {
    /// Connector client id, present when the host is reachable through the connector
    #[serde(default)]
    pub rhc_client_id: Option<String>,
    /// Profile id last applied to the host
    #[serde(default)]
    pub rhc_config_state: Option<String>,
}

impl Host {
    /// Non-empty connector client id, if any
    #[must_use]
    pub fn connector_id(&self) -> Option<&str> {
        self.system_profile
            .rhc_client_id
            .as_deref()
            .filter(|id| !id.is_empty())
    }

    /// Profile id the host last reported as applied
    #[must_use]
    pub fn config_state(&self) -> Option<&str> {
        self.system_profile.rhc_config_state.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_id_ignores_empty() {
        let mut host = Host {
            id: "h1".to_string(),
            ..Default::default()
        };
        assert_eq!(host.connector_id(), None);

        host.system_profile.rhc_client_id = Some(String::new());
        assert_eq!(host.connector_id(), None);

        host.system_profile.rhc_client_id = Some("rhc-1".to_string());
        assert_eq!(host.connector_id(), Some("rhc-1"));
    }

    #[test]
    fn test_deserialize_sparse_host() {
        let host: Host = serde_json::from_str(
            r#"{"id":"h1","org_id":"o1","account":null,"system_profile":{"rhc_client_id":"c1"}}"#,
        )
        .unwrap();

        assert_eq!(host.org_id, "o1");
        assert_eq!(host.connector_id(), Some("c1"));
        assert_eq!(host.config_state(), None);
    }
}
