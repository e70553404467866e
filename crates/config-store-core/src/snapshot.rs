//! Canonical snapshot codec for the replicated configuration map.
//!
//! The RSM itself stores its live state in a `BTreeMap<(ProjectId, ConfigKey), ConfigRecord>`
//! rather than a `HashMap`, which makes "serialise in canonical key order" a property of the
//! data structure instead of an explicit sort step on every snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use config_types::command::{ConfigKey, ProjectId, SchemaId};
use config_types::record::ConfigRecord;
use config_types::version::Version;

use crate::error::{StoreError, StoreResult};

/// Current encoding version for [`Snapshot`]. Unknown values are rejected on restore.
pub const SNAPSHOT_SCHEMA_VERSION: u8 = 1;

/// One entry in a canonical snapshot, flattening the `(ProjectId, ConfigKey)` key
/// alongside its record fields for a stable wire shape independent of how the
/// RSM happens to represent its map in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Project identifier.
    pub project_id: ProjectId,
    /// Configuration key.
    pub key: ConfigKey,
    /// Schema the content validates against.
    pub schema_id: SchemaId,
    /// Current version.
    pub version: Version,
    /// Current content.
    pub content: serde_json::Value,
    /// Last author.
    pub author: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A point-in-time encoding of the RSM's entire live state plus the log index
/// it reflects, used for log compaction and follower catch-up via InstallSnapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Encoding version; see [`SNAPSHOT_SCHEMA_VERSION`].
    pub schema_version: u8,
    /// Last log index reflected in `entries`.
    pub applied_index: u64,
    /// Every live record, ordered by `(project_id, key)`.
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Build a snapshot from a canonically-ordered map and the index it reflects.
    pub fn from_ordered_map(
        applied_index: u64,
        map: &std::collections::BTreeMap<(ProjectId, ConfigKey), ConfigRecord>,
    ) -> Self {
        let entries = map
            .iter()
            .map(|((project_id, key), record)| SnapshotEntry {
                project_id: project_id.clone(),
                key: key.clone(),
                schema_id: record.schema_id.clone(),
                version: record.version,
                content: record.content.clone(),
                author: record.author.clone(),
                created_at: record.created_at,
                updated_at: record.updated_at,
            })
            .collect();
        Snapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            applied_index,
            entries,
        }
    }

    /// Rebuild the canonically-ordered map this snapshot represents.
    pub fn into_ordered_map(
        self,
    ) -> std::collections::BTreeMap<(ProjectId, ConfigKey), ConfigRecord> {
        self.entries
            .into_iter()
            .map(|entry| {
                (
                    (entry.project_id, entry.key),
                    ConfigRecord {
                        schema_id: entry.schema_id,
                        version: entry.version,
                        content: entry.content,
                        author: entry.author,
                        created_at: entry.created_at,
                        updated_at: entry.updated_at,
                    },
                )
            })
            .collect()
    }

    /// Encode to the bytes persisted by the consensus layer's snapshot storage.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| StoreError::Backend(e.to_string()))
    }

    /// Decode a snapshot, rejecting unknown schema versions.
    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        let snapshot: Snapshot =
            bincode::deserialize(bytes).map_err(|e| StoreError::Backend(e.to_string()))?;
        if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(StoreError::Backend(format!(
                "unsupported snapshot schema version {}",
                snapshot.schema_version
            )));
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn sample_record(version: u64) -> ConfigRecord {
        ConfigRecord {
            schema_id: "sch1".into(),
            version: Version::try_from_u64(version).unwrap(),
            content: json!({"enabled": true}),
            author: "alice".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn roundtrip_preserves_entries_and_index() {
        let mut map = BTreeMap::new();
        map.insert(("proj1".to_string(), "b".to_string()), sample_record(2));
        map.insert(("proj1".to_string(), "a".to_string()), sample_record(1));

        let snapshot = Snapshot::from_ordered_map(42, &map);
        assert_eq!(snapshot.entries[0].key, "a");
        assert_eq!(snapshot.entries[1].key, "b");

        let bytes = snapshot.encode().unwrap();
        let decoded = Snapshot::decode(&bytes).unwrap();
        assert_eq!(decoded.applied_index, 42);
        assert_eq!(decoded.into_ordered_map(), map);
    }

    #[test]
    fn decode_rejects_unknown_schema_version() {
        let mut snapshot = Snapshot::from_ordered_map(0, &BTreeMap::new());
        snapshot.schema_version = 7;
        let bytes = bincode::serialize(&snapshot).unwrap();
        assert!(Snapshot::decode(&bytes).is_err());
    }
}
