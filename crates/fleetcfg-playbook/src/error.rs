//! Error types for fleetcfg-playbook

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading templates or compiling a playbook
#[derive(Error, Debug)]
pub enum PlaybookError {
    /// State value other than `enabled`/`disabled`
    #[error("unknown state value {value:?} for service {service}")]
    UnknownStateValue {
        /// Service key
        service: String,
        /// Offending value
        value: String,
    },

    /// Template directory or file could not be read
    #[error("failed to load templates from {path}: {source}")]
    TemplateLoad {
        /// Path being read
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
}
