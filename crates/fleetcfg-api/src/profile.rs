//! Versioned configuration profile and its state-map view

use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Service name to `"enabled"`/`"disabled"` mapping
pub type StateMap = BTreeMap<String, String>;

/// State-map key for the insights service
pub const INSIGHTS: &str = "insights";
/// State-map key for the remediations service
pub const REMEDIATIONS: &str = "remediations";
/// State-map key for the compliance service
pub const COMPLIANCE: &str = "compliance_openscap";

/// State value for an enabled service
pub const ENABLED: &str = "enabled";
/// State value for a disabled service
pub const DISABLED: &str = "disabled";

/// One immutable version of an organization's desired service state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    /// Profile identifier
    pub id: Uuid,
    /// Optional name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Optional display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Legacy account number
    #[serde(default)]
    pub account_id: Option<String>,
    /// Owning organization
    pub org_id: String,
    /// Creation time, decides which profile is current
    pub created_at: DateTime<Utc>,
    /// Whether automatic convergence is wanted at all
    pub active: bool,
    /// Who created this version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    pub insights: bool,
    pub remediations: bool,
    pub compliance: bool,
}

impl Profile {
    /// Build a fresh, inactive profile for `org_id` from a state map
    #[must_use]
    pub fn new(org_id: impl Into<String>, account_id: Option<String>, state: &StateMap) -> Self {
        let mut profile = Self {
            id: Uuid::new_v4(),
            name: None,
            label: None,
            account_id,
            org_id: org_id.into(),
            created_at: now(),
            active: false,
            creator: None,
            insights: false,
            remediations: false,
            compliance: false,
        };
        profile.set_state_config(state);
        profile
    }

    /// New in-memory version with a fresh id and timestamp; nothing is persisted
    #[must_use]
    pub fn copy(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: now(),
            ..self.clone()
        }
    }

    /// The service flags as a state map
    #[must_use]
    pub fn state_config(&self) -> StateMap {
        StateMap::from([
            (INSIGHTS.to_string(), state_value(self.insights)),
            (REMEDIATIONS.to_string(), state_value(self.remediations)),
            (COMPLIANCE.to_string(), state_value(self.compliance)),
        ])
    }

    /// Override service flags from a state map; unknown keys are ignored
    pub fn set_state_config(&mut self, state: &StateMap) {
        for (service, value) in state {
            let enabled = value == ENABLED;
            match service.as_str() {
                INSIGHTS => self.insights = enabled,
                REMEDIATIONS => self.remediations = enabled,
                COMPLIANCE => self.compliance = enabled,
                _ => {}
            }
        }
    }

    /// Whether `other` carries the same active flag and service flags
    #[must_use]
    pub fn same_settings(&self, other: &Profile) -> bool {
        self.active == other.active
            && self.insights == other.insights
            && self.remediations == other.remediations
            && self.compliance == other.compliance
    }
}

fn state_value(enabled: bool) -> String {
    let value = if enabled { ENABLED } else { DISABLED };
    value.to_string()
}

// Storage keeps microseconds
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(insights: &str, remediations: &str, compliance: &str) -> StateMap {
        StateMap::from([
            (INSIGHTS.to_string(), insights.to_string()),
            (REMEDIATIONS.to_string(), remediations.to_string()),
            (COMPLIANCE.to_string(), compliance.to_string()),
        ])
    }

    #[test]
    fn test_new_profile_maps_state() {
        let profile = Profile::new("org-1", None, &state(ENABLED, DISABLED, ENABLED));

        assert_eq!(profile.org_id, "org-1");
        assert!(profile.insights);
        assert!(!profile.remediations);
        assert!(profile.compliance);
        assert!(!profile.active);
    }

    #[test]
    fn test_state_config_uses_compliance_key() {
        let profile = Profile::new("org-1", None, &state(ENABLED, ENABLED, DISABLED));
        let map = profile.state_config();

        assert_eq!(map.get("compliance_openscap").map(String::as_str), Some(DISABLED));
        assert_eq!(map.get("insights").map(String::as_str), Some(ENABLED));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_set_state_config_ignores_unknown_keys() {
        let mut profile = Profile::new("org-1", None, &state(DISABLED, DISABLED, DISABLED));
        let mut update = StateMap::new();
        update.insert("insights".to_string(), ENABLED.to_string());
        update.insert("nonsense".to_string(), ENABLED.to_string());
        profile.set_state_config(&update);

        assert!(profile.insights);
        assert!(!profile.remediations);
    }

    #[test]
    fn test_copy_gets_fresh_identity() {
        let mut original = Profile::new("org-1", Some("acct".to_string()), &StateMap::new());
        original.label = Some("baseline".to_string());
        original.active = true;

        let copy = original.copy();

        assert_ne!(copy.id, original.id);
        assert!(copy.created_at >= original.created_at);
        assert_eq!(copy.label, original.label);
        assert_eq!(copy.account_id, original.account_id);
        assert!(copy.same_settings(&original));
    }

    #[test]
    fn test_profile_json_shape() {
        let profile = Profile::new("org-1", None, &state(ENABLED, ENABLED, ENABLED));
        let json = serde_json::to_value(&profile).unwrap();

        assert_eq!(json["org_id"], "org-1");
        assert_eq!(json["compliance"], true);
        assert!(json.get("name").is_none());
        assert!(json["account_id"].is_null());
    }
}
