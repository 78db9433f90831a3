//! Requested-state reconciliation

use fleetcfg_api::StateMap;
use fleetcfg_api::profile::{DISABLED, INSIGHTS};
use thiserror::Error;

/// Result of comparing a requested state with the current one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Requested state equals the current one, nothing to persist
    Noop,
    /// A new profile should be persisted
    Changed,
}

impl Reconciliation {
    #[must_use]
    pub fn is_noop(self) -> bool {
        self == Reconciliation::Noop
    }
}

/// Requested state enables a service that depends on a disabled insights
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("service {service} must be disabled if insights is disabled")]
pub struct PolicyViolation {
    /// First offending service in key order
    pub service: String,
}

/// Compare `requested` with `current`
///
/// # Errors
/// Returns `PolicyViolation` when insights is disabled but another service is not
pub fn reconcile(current: &StateMap, requested: &StateMap) -> Result<Reconciliation, PolicyViolation> {
    if current == requested {
        return Ok(Reconciliation::Noop);
    }

    if requested.get(INSIGHTS).map(String::as_str) == Some(DISABLED)
        && let Some((service, _)) = requested.iter().find(|(_, value)| value.as_str() != DISABLED)
    {
        return Err(PolicyViolation {
            service: service.clone(),
        });
    }

    Ok(Reconciliation::Changed)
}

#[cfg(test)]
mod tests {
    use fleetcfg_api::profile::{COMPLIANCE, ENABLED, REMEDIATIONS};

    use super::*;

    fn state(insights: &str, remediations: &str, compliance: &str) -> StateMap {
        StateMap::from([
            (INSIGHTS.to_string(), insights.to_string()),
            (REMEDIATIONS.to_string(), remediations.to_string()),
            (COMPLIANCE.to_string(), compliance.to_string()),
        ])
    }

    #[test]
    fn test_identical_states_are_noop() {
        for s in [
            state(ENABLED, ENABLED, ENABLED),
            state(DISABLED, DISABLED, DISABLED),
            state(DISABLED, ENABLED, ENABLED),
            StateMap::new(),
        ] {
            assert_eq!(reconcile(&s, &s), Ok(Reconciliation::Noop));
        }
    }

    #[test]
    fn test_change_is_not_noop() {
        let result = reconcile(&state(ENABLED, ENABLED, ENABLED), &state(ENABLED, DISABLED, ENABLED));
        assert_eq!(result, Ok(Reconciliation::Changed));
    }

    #[test]
    fn test_insights_disabled_requires_all_disabled() {
        let current = state(ENABLED, ENABLED, ENABLED);

        let err = reconcile(&current, &state(DISABLED, ENABLED, DISABLED)).unwrap_err();
        assert_eq!(err.service, REMEDIATIONS);
        assert_eq!(err.to_string(), "service remediations must be disabled if insights is disabled");

        let err = reconcile(&current, &state(DISABLED, DISABLED, ENABLED)).unwrap_err();
        assert_eq!(err.service, COMPLIANCE);

        assert_eq!(
            reconcile(&current, &state(DISABLED, DISABLED, DISABLED)),
            Ok(Reconciliation::Changed)
        );
    }

    #[test]
    fn test_unknown_values_count_as_not_disabled() {
        let mut requested = state(DISABLED, DISABLED, DISABLED);
        requested.insert("zeta".to_string(), "maybe".to_string());

        let err = reconcile(&StateMap::new(), &requested).unwrap_err();
        assert_eq!(err.service, "zeta");
    }

    #[test]
    fn test_requested_seed_state_is_noop() {
        // current profile of org 78606 has every service enabled
        let current = state(ENABLED, ENABLED, ENABLED);
        let requested = StateMap::from([
            ("insights".to_string(), "enabled".to_string()),
            ("remediations".to_string(), "enabled".to_string()),
            ("compliance_openscap".to_string(), "enabled".to_string()),
        ]);

        assert!(reconcile(&current, &requested).unwrap().is_noop());
    }
}
