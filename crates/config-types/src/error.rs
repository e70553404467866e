//! Error surface for the configuration engine core.

use thiserror::Error;

/// Result type alias used throughout the engine's core crates.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors produced by the replicated configuration engine.
///
/// Variants are split the way `raft_core::RaftError` splits its own: preflight
/// checks the write pipeline can reject before ever touching the log, apply-time
/// outcomes delivered through the correlation future, and infrastructure errors
/// that surround both.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The proposed document failed schema validation.
    #[error("validation failed: {message}")]
    ValidationFailed {
        /// JSON pointer to the first violation, when available.
        path: Option<String>,
        /// Human-readable description of the violation.
        message: String,
    },

    /// `raw` was less than 1.
    #[error("invalid version: {value}")]
    InvalidVersion {
        /// The rejected raw value.
        value: u64,
    },

    /// An Update/Rollback precondition did not match the record's current version.
    #[error("version conflict: expected {expected}, current {current}")]
    VersionConflict {
        /// The version the caller believed was current.
        expected: u64,
        /// The version actually stored.
        current: u64,
    },

    /// No record exists at the targeted `(projectID, key)`.
    #[error("configuration not found")]
    NotFound,

    /// A Create targeted a `(projectID, key)` that already has a record.
    #[error("configuration already exists")]
    AlreadyExists,

    /// The referenced schema does not exist.
    #[error("schema not found: {schema_id}")]
    SchemaNotFound {
        /// The schema identifier that could not be resolved.
        schema_id: String,
    },

    /// The referenced project does not exist.
    #[error("project not found: {project_id}")]
    ProjectNotFound {
        /// The project identifier that could not be resolved.
        project_id: String,
    },

    /// The presented API key does not parse as a well-formed key.
    #[error("invalid api key")]
    InvalidApiKey,

    /// The presented API key is well-formed but does not resolve to a project.
    #[error("unknown api key")]
    UnknownApiKey,

    /// The write was submitted to a node that is not the current leader.
    #[error("not leader{}", hint.as_ref().map(|h| format!(" (hint: {h})")).unwrap_or_default())]
    NotLeader {
        /// Address of the current leader, if known.
        hint: Option<String>,
    },

    /// The apply future did not resolve before the configured deadline.
    #[error("operation timed out")]
    Timeout,

    /// The proposer lost leadership before the command committed.
    #[error("leadership lost before commit")]
    LeadershipLost,

    /// The consensus layer could not accept a proposal (e.g. no quorum).
    #[error("consensus unavailable: {message}")]
    ConsensusUnavailable {
        /// Description forwarded from the consensus layer.
        message: String,
    },

    /// The configuration state advanced but the revision log write failed.
    #[error("revision write failed: {message}")]
    RevisionWriteFailed {
        /// Description of the underlying storage failure.
        message: String,
    },

    /// Catch-all for errors that do not fit another variant.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConfigError {
    /// Construct a [`ConfigError::VersionConflict`].
    pub fn version_conflict(expected: u64, current: u64) -> Self {
        ConfigError::VersionConflict { expected, current }
    }

    /// Construct a [`ConfigError::ValidationFailed`] with no path information.
    pub fn validation_failed<S: Into<String>>(message: S) -> Self {
        ConfigError::ValidationFailed {
            path: None,
            message: message.into(),
        }
    }

    /// Whether a caller may reasonably retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConfigError::Timeout
                | ConfigError::LeadershipLost
                | ConfigError::ConsensusUnavailable { .. }
        )
    }
}
