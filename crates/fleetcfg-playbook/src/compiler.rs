//! State map to playbook compilation

use std::sync::Arc;

use fleetcfg_api::StateMap;
use fleetcfg_api::profile::{DISABLED, ENABLED, INSIGHTS};
use tracing::warn;

use crate::error::PlaybookError;
use crate::registry::TemplateRegistry;

/// Leading lines of every compiled playbook
pub const PLAYBOOK_HEADER: &str = "---\n# Service Enablement playbook\n";

/// Compiles state maps against a shared template registry
#[derive(Debug, Clone)]
pub struct PlaybookCompiler {
    registry: Arc<TemplateRegistry>,
}

impl PlaybookCompiler {
    #[must_use]
    pub fn new(registry: Arc<TemplateRegistry>) -> Self {
        Self { registry }
    }

    /// Build the playbook for `state`
    ///
    /// `insights` is emitted first, remaining services in lexical order.
    /// Services whose template is not registered are left out.
    ///
    /// # Errors
    /// Returns `PlaybookError::UnknownStateValue` for values other than `enabled`/`disabled`
    pub fn compile(&self, state: &StateMap) -> Result<String, PlaybookError> {
        let mut services: Vec<(&String, &String)> = state.iter().collect();
        services.sort_by_key(|(service, _)| service.as_str() != INSIGHTS);

        let mut playbook = String::from(PLAYBOOK_HEADER);
        for (service, value) in services {
            let action = match value.as_str() {
                ENABLED => "setup",
                DISABLED => "remove",
                _ => {
                    return Err(PlaybookError::UnknownStateValue {
                        service: service.clone(),
                        value: value.clone(),
                    });
                }
            };

            let name = format!("{service}_{action}");
            match self.registry.get(&name) {
                Some(template) => playbook.push_str(template.trim_matches('-')),
                None => warn!(service = %service, template = %name, "no playbook template, skipping service"),
            }
        }

        Ok(playbook)
    }
}
