//! Tunables for dispatch, enablement and the consumers

use std::time::Duration;

use fleetcfg_api::StateMap;
use fleetcfg_api::profile::{COMPLIANCE, ENABLED, INSIGHTS, REMEDIATIONS};
use uuid::Uuid;

/// Placeholder substituted with the profile id in [`DispatchConfig::playbook_url`]
pub const PROFILE_ID_PLACEHOLDER: &str = "{profile_id}";

/// Fleet dispatch configuration
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Upper bound on runs per dispatcher call
    pub batch_size: usize,
    /// Playbook fetch URL containing `{profile_id}`
    pub playbook_url: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            playbook_url: "http://localhost:8081/api/config-manager/v2/playbooks?profile_id={profile_id}"
                .to_string(),
        }
    }
}

impl DispatchConfig {
    /// Playbook URL for one profile
    #[must_use]
    pub fn playbook_url_for(&self, profile_id: Uuid) -> String {
        self.playbook_url
            .replace(PROFILE_ID_PLACEHOLDER, &profile_id.to_string())
    }
}

/// Host enablement configuration
#[derive(Debug, Clone)]
pub struct EnableConfig {
    /// Pause between status polls
    pub poll_interval: Duration,
    /// Ceiling for each polling phase
    pub timeout: Duration,
    /// Capability that installs packages
    pub base_capability: String,
    /// Capability that runs playbooks
    pub worker_capability: String,
}

impl Default for EnableConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(180),
            base_capability: "package-manager".to_string(),
            worker_capability: "rhc-worker-playbook".to_string(),
        }
    }
}

/// Dispatcher-result consumer configuration
#[derive(Debug, Clone)]
pub struct DispatchResultConfig {
    /// Value of the `service` header owned by this system
    pub service_name: String,
    /// Prefix of outbound message keys
    pub key_prefix: String,
    /// Topic receiving inventory updates
    pub update_topic: String,
}

impl Default for DispatchResultConfig {
    fn default() -> Self {
        Self {
            service_name: "config_manager".to_string(),
            key_prefix: "cm".to_string(),
            update_topic: "platform.inventory.system-profile".to_string(),
        }
    }
}

/// Inventory-event consumer configuration
#[derive(Debug, Clone)]
pub struct InventoryEventConfig {
    /// Events older than this are dropped
    pub stale_after: Duration,
    /// State of the default profile created for new organizations
    pub default_state: StateMap,
    /// Run host enablement for `created` events
    pub enable_on_create: bool,
    /// Dispatch the current profile to hosts reporting another one
    pub converge: bool,
}

impl Default for InventoryEventConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(24 * 60 * 60),
            default_state: default_service_state(),
            enable_on_create: true,
            converge: true,
        }
    }
}

/// Every managed service enabled
#[must_use]
pub fn default_service_state() -> StateMap {
    [INSIGHTS, COMPLIANCE, REMEDIATIONS]
        .into_iter()
        .map(|service| (service.to_string(), ENABLED.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playbook_url_for() {
        let config = DispatchConfig {
            batch_size: 1,
            playbook_url: "https://cm.example/playbooks?profile_id={profile_id}".to_string(),
        };
        let id = Uuid::nil();
        assert_eq!(
            config.playbook_url_for(id),
            "https://cm.example/playbooks?profile_id=00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_default_state_enables_all() {
        let state = default_service_state();
        assert_eq!(state.len(), 3);
        assert!(state.values().all(|v| v == ENABLED));
    }
}
