//! The replicated state machine: the sole writer of live configuration state,
//! applied deterministically in consensus log order on every replica.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use config_store_core::snapshot::Snapshot;
use config_types::command::{Command, ConfigKey, ProjectId};
use config_types::record::ConfigRecord;
use config_types::{ApplyOutcome, ApplyRejection, CommandEnvelope};
use raft_core::{LogEntry, RaftError, RaftResult};

/// Owns `(projectID, key) -> ConfigRecord` and applies commands from the
/// consensus log. A `BTreeMap` is used rather than a `HashMap` so that
/// snapshot serialization in canonical key order falls out of the data
/// structure instead of requiring an explicit sort at snapshot time.
pub struct ConfigStateMachine {
    records: BTreeMap<(ProjectId, ConfigKey), ConfigRecord>,
    applied_index: u64,
}

impl ConfigStateMachine {
    /// An empty state machine with no applied entries.
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            applied_index: 0,
        }
    }

    /// Read a live record without going through the consensus layer. Callers
    /// on the leader observe this as linearizable only with respect to
    /// commands this node has itself applied; followers may lag.
    pub fn get(&self, project_id: &str, key: &str) -> Option<ConfigRecord> {
        self.records
            .get(&(project_id.to_string(), key.to_string()))
            .cloned()
    }

    /// Last consensus log index reflected in this state.
    pub fn applied_index(&self) -> u64 {
        self.applied_index
    }

    /// Deterministic apply: a pure function of `(command, preState)`. Never
    /// performs I/O or reads the wall clock; `leader_time` is supplied by the
    /// proposer so every replica computes identical timestamps.
    fn apply_command(&mut self, command: Command, leader_time: DateTime<Utc>) -> ApplyOutcome {
        match command {
            Command::Create {
                project_id,
                key,
                schema_id,
                content,
                author,
            } => {
                let target = (project_id, key);
                if self.records.contains_key(&target) {
                    return ApplyOutcome::Rejected(ApplyRejection::AlreadyExists);
                }
                let record = ConfigRecord {
                    schema_id,
                    version: config_types::Version::initial(),
                    content: content.clone(),
                    author,
                    created_at: leader_time,
                    updated_at: leader_time,
                };
                let outcome = ApplyOutcome::Applied {
                    version: record.version,
                    content: record.content.clone(),
                };
                self.records.insert(target, record);
                outcome
            }

            Command::Update {
                project_id,
                key,
                expected_version,
                content,
                author,
            } => {
                let target = (project_id, key);
                let Some(record) = self.records.get_mut(&target) else {
                    return ApplyOutcome::Rejected(ApplyRejection::NotFound);
                };
                if record.version.get() != expected_version {
                    return ApplyOutcome::Rejected(ApplyRejection::VersionConflict {
                        expected: expected_version,
                        current: record.version.get(),
                    });
                }
                record.version = record.version.next();
                record.content = content;
                record.author = author;
                record.updated_at = leader_time;
                ApplyOutcome::Applied {
                    version: record.version,
                    content: record.content.clone(),
                }
            }

            Command::Delete { project_id, key, .. } => {
                let target = (project_id, key);
                match self.records.remove(&target) {
                    Some(record) => ApplyOutcome::Applied {
                        version: record.version,
                        content: serde_json::Value::Null,
                    },
                    None => ApplyOutcome::Rejected(ApplyRejection::NotFound),
                }
            }

            Command::Rollback {
                project_id,
                key,
                content,
                author,
                ..
            } => {
                let target = (project_id, key);
                let Some(record) = self.records.get_mut(&target) else {
                    return ApplyOutcome::Rejected(ApplyRejection::NotFound);
                };
                record.version = record.version.next();
                record.content = content;
                record.author = author;
                record.updated_at = leader_time;
                ApplyOutcome::Applied {
                    version: record.version,
                    content: record.content.clone(),
                }
            }
        }
    }
}

impl Default for ConfigStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl raft_core::StateMachine for ConfigStateMachine {
    async fn apply(&mut self, entry: &LogEntry) -> RaftResult<Vec<u8>> {
        let envelope = CommandEnvelope::decode(&entry.data)
            .map_err(|e| RaftError::internal(e.to_string()))?;
        let outcome = self.apply_command(envelope.command, envelope.leader_time);
        self.applied_index = entry.index;
        bincode::serialize(&outcome).map_err(|e| RaftError::internal(e.to_string()))
    }

    async fn take_snapshot(&mut self) -> RaftResult<Vec<u8>> {
        let snapshot = Snapshot::from_ordered_map(self.applied_index, &self.records);
        snapshot.encode().map_err(|e| RaftError::internal(e.to_string()))
    }

    async fn restore_from_snapshot(&mut self, snapshot: &[u8]) -> RaftResult<()> {
        let snapshot =
            Snapshot::decode(snapshot).map_err(|e| RaftError::internal(e.to_string()))?;
        self.applied_index = snapshot.applied_index;
        self.records = snapshot.into_ordered_map();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_types::command::CommandEnvelope as Envelope;
    use raft_core::StateMachine;
    use serde_json::json;

    fn entry(index: u64, command: Command, leader_time: DateTime<Utc>) -> LogEntry {
        let envelope = Envelope::new(command, leader_time);
        LogEntry::new_command(1, index, envelope.encode().unwrap())
    }

    fn decode(bytes: Vec<u8>) -> ApplyOutcome {
        bincode::deserialize(&bytes).unwrap()
    }

    #[tokio::test]
    async fn create_then_update_advances_version_by_one() {
        let mut sm = ConfigStateMachine::new();
        let now = Utc::now();

        let create = Command::Create {
            project_id: "proj1".into(),
            key: "feature-x".into(),
            schema_id: "sch1".into(),
            content: json!({"enabled": true}),
            author: "alice".into(),
        };
        let outcome = decode(sm.apply(&entry(1, create, now)).await.unwrap());
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                version: config_types::Version::initial(),
                content: json!({"enabled": true})
            }
        );

        let update = Command::Update {
            project_id: "proj1".into(),
            key: "feature-x".into(),
            expected_version: 1,
            content: json!({"enabled": false}),
            author: "alice".into(),
        };
        let outcome = decode(sm.apply(&entry(2, update, now)).await.unwrap());
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                version: config_types::Version::try_from_u64(2).unwrap(),
                content: json!({"enabled": false})
            }
        );
        assert_eq!(sm.applied_index(), 2);
    }

    #[tokio::test]
    async fn update_with_stale_expected_version_is_rejected_not_log_failure() {
        let mut sm = ConfigStateMachine::new();
        let now = Utc::now();
        let create = Command::Create {
            project_id: "p".into(),
            key: "k".into(),
            schema_id: "s".into(),
            content: json!({}),
            author: "a".into(),
        };
        sm.apply(&entry(1, create, now)).await.unwrap();

        let stale_update = Command::Update {
            project_id: "p".into(),
            key: "k".into(),
            expected_version: 5,
            content: json!({"x": 1}),
            author: "a".into(),
        };
        let outcome = decode(sm.apply(&entry(2, stale_update, now)).await.unwrap());
        assert_eq!(
            outcome,
            ApplyOutcome::Rejected(ApplyRejection::VersionConflict {
                expected: 5,
                current: 1
            })
        );
        // The rejected command still counted as applied: the RSM advanced past it.
        assert_eq!(sm.applied_index(), 2);
        assert_eq!(sm.get("p", "k").unwrap().version.get(), 1);
    }

    #[tokio::test]
    async fn snapshot_roundtrip_preserves_state_and_applied_index() {
        let mut sm = ConfigStateMachine::new();
        let now = Utc::now();
        let create = Command::Create {
            project_id: "p".into(),
            key: "k".into(),
            schema_id: "s".into(),
            content: json!({"a": 1}),
            author: "a".into(),
        };
        sm.apply(&entry(7, create, now)).await.unwrap();

        let bytes = sm.take_snapshot().await.unwrap();
        let mut restored = ConfigStateMachine::new();
        restored.restore_from_snapshot(&bytes).await.unwrap();

        assert_eq!(restored.applied_index(), 7);
        assert_eq!(restored.get("p", "k"), sm.get("p", "k"));
    }

    #[tokio::test]
    async fn delete_removes_record_and_second_delete_is_not_found() {
        let mut sm = ConfigStateMachine::new();
        let now = Utc::now();
        let create = Command::Create {
            project_id: "p".into(),
            key: "k".into(),
            schema_id: "s".into(),
            content: json!({}),
            author: "a".into(),
        };
        sm.apply(&entry(1, create, now)).await.unwrap();

        let delete = Command::Delete {
            project_id: "p".into(),
            key: "k".into(),
            author: "a".into(),
        };
        let outcome = decode(sm.apply(&entry(2, delete.clone(), now)).await.unwrap());
        assert!(matches!(outcome, ApplyOutcome::Applied { .. }));
        assert!(sm.get("p", "k").is_none());

        let outcome = decode(sm.apply(&entry(3, delete, now)).await.unwrap());
        assert_eq!(outcome, ApplyOutcome::Rejected(ApplyRejection::NotFound));
    }
}
