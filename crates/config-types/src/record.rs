//! Live record and historical revision types shared between the RSM and the
//! revision log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::command::{ConfigKey, ProjectId, SchemaId};
use crate::version::Version;

/// Live state of a single `(project_id, key)` configuration, as owned by the RSM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigRecord {
    /// Schema this record's content is validated against.
    pub schema_id: SchemaId,
    /// Current version.
    pub version: Version,
    /// Current document content.
    pub content: serde_json::Value,
    /// Identity of the author of the most recent mutation.
    pub author: String,
    /// When `version` first reached 1.
    pub created_at: DateTime<Utc>,
    /// When `version` last changed.
    pub updated_at: DateTime<Utc>,
}

/// An immutable historical snapshot of a configuration at one version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    /// Unique identifier of this revision entry.
    pub revision_id: Uuid,
    /// Project the revisioned configuration belongs to.
    pub project_id: ProjectId,
    /// Key of the revisioned configuration.
    pub config_key: ConfigKey,
    /// Version this revision records.
    pub version: Version,
    /// Content stored at that version.
    pub content: serde_json::Value,
    /// Identity of the author of the mutation that produced this version.
    pub created_by: String,
    /// When this revision was recorded.
    pub created_at: DateTime<Utc>,
}

impl Revision {
    /// Build a revision entry from an applied record.
    pub fn from_record(
        project_id: ProjectId,
        config_key: ConfigKey,
        record: &ConfigRecord,
    ) -> Self {
        Self {
            revision_id: Uuid::new_v4(),
            project_id,
            config_key,
            version: record.version,
            content: record.content.clone(),
            created_by: record.author.clone(),
            created_at: record.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn revision_from_record_carries_record_fields() {
        let record = ConfigRecord {
            schema_id: "sch1".into(),
            version: Version::initial(),
            content: json!({"enabled": true}),
            author: "alice".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let rev = Revision::from_record("proj1".into(), "feature-x".into(), &record);
        assert_eq!(rev.version, record.version);
        assert_eq!(rev.content, record.content);
        assert_eq!(rev.created_by, "alice");
    }
}
