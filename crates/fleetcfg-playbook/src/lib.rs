//! fleetcfg-playbook: Playbook compilation
//!
//! Turns a service state map into one playbook by concatenating per-service
//! setup/remove templates from a [`TemplateRegistry`] built at startup.

pub mod compiler;
pub mod error;
pub mod registry;

pub use compiler::{PLAYBOOK_HEADER, PlaybookCompiler};
pub use error::PlaybookError;
pub use registry::TemplateRegistry;
