//! Command envelope: the wire-level log entry carried by the consensus layer,
//! and the typed outcome delivered back to the proposer once it is applied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigError, ConfigResult};
use crate::version::Version;

/// Stable identifier of a tenant project.
pub type ProjectId = String;

/// Configuration key, unique within a project.
pub type ConfigKey = String;

/// Stable identifier of a JSON Schema document.
pub type SchemaId = String;

/// Current encoding version for [`CommandEnvelope`]. Bump and branch decode on
/// this byte if the wire format ever changes; unknown values are rejected.
pub const COMMAND_SCHEMA_VERSION: u8 = 1;

/// The unit of mutation written to the consensus log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Insert a new record at `(project_id, key)`; fails if one already exists.
    Create {
        /// Target project.
        project_id: ProjectId,
        /// Target key.
        key: ConfigKey,
        /// Schema the content must validate against.
        schema_id: SchemaId,
        /// The document content.
        content: serde_json::Value,
        /// Caller identity recorded on the record and the revision.
        author: String,
    },
    /// Replace the content of an existing record, subject to a version precondition.
    Update {
        /// Target project.
        project_id: ProjectId,
        /// Target key.
        key: ConfigKey,
        /// The version the caller last observed; must equal the stored version.
        expected_version: u64,
        /// The new document content.
        content: serde_json::Value,
        /// Caller identity recorded on the record and the revision.
        author: String,
    },
    /// Remove a record and cascade-delete its revisions.
    Delete {
        /// Target project.
        project_id: ProjectId,
        /// Target key.
        key: ConfigKey,
        /// Caller identity recorded on the revision.
        author: String,
    },
    /// Restore content from a prior revision as a new, monotonically-versioned mutation.
    Rollback {
        /// Target project.
        project_id: ProjectId,
        /// Target key.
        key: ConfigKey,
        /// The historical version whose content is being restored.
        target_version: u64,
        /// Content of that historical revision, fetched by the leader before proposing.
        content: serde_json::Value,
        /// Caller identity recorded on the record and the revision.
        author: String,
    },
}

impl Command {
    /// Project/key pair this command targets.
    pub fn target(&self) -> (&str, &str) {
        match self {
            Command::Create { project_id, key, .. }
            | Command::Update { project_id, key, .. }
            | Command::Delete { project_id, key, .. }
            | Command::Rollback { project_id, key, .. } => (project_id, key),
        }
    }
}

/// The full wire record appended to the consensus log: a [`Command`] plus the
/// envelope metadata (timestamp, correlation id) needed to apply it
/// deterministically and route its result back to the proposer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Encoding version; see [`COMMAND_SCHEMA_VERSION`].
    pub schema_version: u8,
    /// The command itself.
    pub command: Command,
    /// Wall-clock time assigned by the leader at propose time. Apply uses this
    /// verbatim instead of calling `now()`, so every replica computes identical
    /// timestamps for the same log entry.
    pub leader_time: DateTime<Utc>,
    /// Correlation id used to deliver the [`ApplyOutcome`] back to the proposer.
    pub correlation_id: Uuid,
}

impl CommandEnvelope {
    /// Wrap a command with a fresh correlation id and the given leader timestamp.
    pub fn new(command: Command, leader_time: DateTime<Utc>) -> Self {
        Self {
            schema_version: COMMAND_SCHEMA_VERSION,
            command,
            leader_time,
            correlation_id: Uuid::new_v4(),
        }
    }

    /// Encode to the bytes stored in the consensus log.
    pub fn encode(&self) -> ConfigResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| ConfigError::Internal(e.to_string()))
    }

    /// Decode from consensus log bytes, rejecting unknown schema versions.
    pub fn decode(bytes: &[u8]) -> ConfigResult<Self> {
        let envelope: CommandEnvelope =
            bincode::deserialize(bytes).map_err(|e| ConfigError::Internal(e.to_string()))?;
        if envelope.schema_version != COMMAND_SCHEMA_VERSION {
            return Err(ConfigError::Internal(format!(
                "unsupported command schema version {}",
                envelope.schema_version
            )));
        }
        Ok(envelope)
    }
}

/// The per-command result computed by the RSM's apply path and delivered to
/// the proposer via the correlation future.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ApplyOutcome {
    /// The command was accepted; the record now has this version and content.
    Applied {
        /// New version of the record.
        version: Version,
        /// Content stored at that version.
        content: serde_json::Value,
    },
    /// The command was rejected deterministically; no state changed.
    Rejected(ApplyRejection),
}

/// Typed rejection reasons the apply path can produce. A strict subset of
/// [`ConfigError`] — apply never produces infrastructure or preflight errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ApplyRejection {
    /// Create targeted a key that already has a record.
    AlreadyExists,
    /// Update/Delete/Rollback targeted a key with no record.
    NotFound,
    /// Update/Rollback precondition did not match the stored version.
    VersionConflict {
        /// Version the caller expected.
        expected: u64,
        /// Version actually stored.
        current: u64,
    },
}

impl From<ApplyRejection> for ConfigError {
    fn from(rejection: ApplyRejection) -> Self {
        match rejection {
            ApplyRejection::AlreadyExists => ConfigError::AlreadyExists,
            ApplyRejection::NotFound => ConfigError::NotFound,
            ApplyRejection::VersionConflict { expected, current } => {
                ConfigError::version_conflict(expected, current)
            }
        }
    }
}
