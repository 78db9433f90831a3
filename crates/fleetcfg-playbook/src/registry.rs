//! Read-only template registry

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::PlaybookError;

/// Playbook templates keyed by name (`<service>_setup`, `<service>_remove`)
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, String>,
}

impl TemplateRegistry {
    /// Load every `*.yml`/`*.yaml` file in `dir`, keyed by file stem
    ///
    /// # Errors
    /// Returns `PlaybookError::TemplateLoad` if the directory or a template cannot be read
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, PlaybookError> {
        let dir = dir.as_ref();
        let load_err = |path: &Path, source| PlaybookError::TemplateLoad {
            path: path.to_path_buf(),
            source,
        };

        let mut templates = HashMap::new();
        for entry in fs::read_dir(dir).map_err(|e| load_err(dir, e))? {
            let path = entry.map_err(|e| load_err(dir, e))?.path();
            let is_yaml = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "yml" || ext == "yaml");
            if !is_yaml || !path.is_file() {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let content = fs::read_to_string(&path).map_err(|e| load_err(&path, e))?;
            debug!(template = name, "loaded playbook template");
            templates.insert(name.to_string(), content);
        }

        info!(dir = %dir.display(), count = templates.len(), "playbook templates loaded");
        Ok(Self { templates })
    }

    /// Build a registry from in-memory templates
    pub fn from_templates<I, K, V>(templates: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            templates: templates
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Template content by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
