//! Error types for fleetcfg-store

use thiserror::Error;

/// Errors that can occur in profile store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// No matching profile
    #[error("profile not found: {0}")]
    NotFound(String),

    /// Caller-supplied sort input was rejected
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The database rejected the read or write
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Blocking database task failed or the connection lock was poisoned
    #[error("storage task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// Check if the error is an expected absence
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Malformed order-by input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// More than one `:` separator
    #[error("cannot parse order: {0}")]
    Malformed(String),

    /// Column outside the profile schema
    #[error("invalid column field: {0}")]
    InvalidColumn(String),

    /// Direction other than ASC/DESC
    #[error("invalid order direction: {0}")]
    InvalidDirection(String),
}
