//! Errors surfaced by the external collaborator traits.

use thiserror::Error;

/// Result type alias for collaborator storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors a [`crate::traits::RevisionStore`], [`crate::traits::SchemaRepository`],
/// or [`crate::traits::ProjectRepository`] implementation may return.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The underlying storage backend failed (connection, I/O, serialization).
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A uniqueness or referential constraint was violated.
    #[error("constraint violation: {0}")]
    Constraint(String),
}

impl From<StoreError> for config_types::ConfigError {
    fn from(err: StoreError) -> Self {
        config_types::ConfigError::Internal(err.to_string())
    }
}
