#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **config-store-memory** – non-persistent implementations of the
//! collaborator traits in `config-store-core`, for tests and single-process
//! development. Modeled on `toka-store-memory`'s `MemoryBackend`: plain
//! `HashMap`s behind a `tokio::sync::RwLock`, all data lost on process exit.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use config_store_core::error::StoreResult;
use config_store_core::traits::{ProjectRepository, RevisionStore, SchemaRepository};
use config_types::command::{ConfigKey, ProjectId, SchemaId};
use config_types::record::Revision;
use config_types::version::Version;

/// An in-memory project repository keyed by API key.
#[derive(Debug, Clone, Default)]
pub struct MemoryProjectRepository {
    by_api_key: Arc<RwLock<HashMap<String, ProjectId>>>,
}

impl MemoryProjectRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a project under an API key, for test setup.
    pub async fn insert(&self, api_key: impl Into<String>, project_id: ProjectId) {
        self.by_api_key.write().await.insert(api_key.into(), project_id);
    }
}

#[async_trait]
impl ProjectRepository for MemoryProjectRepository {
    async fn resolve_by_api_key(&self, api_key: &str) -> StoreResult<Option<ProjectId>> {
        Ok(self.by_api_key.read().await.get(api_key).cloned())
    }
}

/// An in-memory schema repository keyed by schema id.
#[derive(Debug, Clone, Default)]
pub struct MemorySchemaRepository {
    documents: Arc<RwLock<HashMap<SchemaId, serde_json::Value>>>,
}

impl MemorySchemaRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema document, for test setup.
    pub async fn insert(&self, schema_id: impl Into<SchemaId>, document: serde_json::Value) {
        self.documents.write().await.insert(schema_id.into(), document);
    }
}

#[async_trait]
impl SchemaRepository for MemorySchemaRepository {
    async fn schema_document(
        &self,
        schema_id: &SchemaId,
    ) -> StoreResult<Option<serde_json::Value>> {
        Ok(self.documents.read().await.get(schema_id).cloned())
    }
}

/// An in-memory revision log keyed by `(project_id, key, version)`.
#[derive(Debug, Clone, Default)]
pub struct MemoryRevisionStore {
    revisions: Arc<RwLock<HashMap<(ProjectId, ConfigKey), Vec<Revision>>>>,
}

impl MemoryRevisionStore {
    /// Create an empty revision log.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevisionStore for MemoryRevisionStore {
    async fn append(&self, revision: Revision) -> StoreResult<()> {
        let mut revisions = self.revisions.write().await;
        let entry = revisions
            .entry((revision.project_id.clone(), revision.config_key.clone()))
            .or_default();
        if !entry.iter().any(|r| r.version == revision.version) {
            entry.push(revision);
        }
        Ok(())
    }

    async fn get(
        &self,
        project_id: &ProjectId,
        key: &ConfigKey,
        version: Version,
    ) -> StoreResult<Option<Revision>> {
        let revisions = self.revisions.read().await;
        Ok(revisions
            .get(&(project_id.clone(), key.clone()))
            .and_then(|entries| entries.iter().find(|r| r.version == version).cloned()))
    }

    async fn list_descending(
        &self,
        project_id: &ProjectId,
        key: &ConfigKey,
        limit: usize,
    ) -> StoreResult<Vec<Revision>> {
        let revisions = self.revisions.read().await;
        let mut entries = revisions
            .get(&(project_id.clone(), key.clone()))
            .cloned()
            .unwrap_or_default();
        entries.sort_by(|a, b| b.version.cmp(&a.version));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn delete_all(&self, project_id: &ProjectId, key: &ConfigKey) -> StoreResult<()> {
        self.revisions
            .write()
            .await
            .remove(&(project_id.clone(), key.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn revision(version: u64) -> Revision {
        Revision {
            revision_id: Uuid::new_v4(),
            project_id: "proj1".into(),
            config_key: "feature-x".into(),
            version: Version::try_from_u64(version).unwrap(),
            content: json!({"enabled": true}),
            created_by: "alice".into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn project_repository_resolves_registered_key() {
        let repo = MemoryProjectRepository::new();
        repo.insert("key-123", "proj1".to_string()).await;
        assert_eq!(
            repo.resolve_by_api_key("key-123").await.unwrap(),
            Some("proj1".to_string())
        );
        assert_eq!(repo.resolve_by_api_key("unknown").await.unwrap(), None);
    }

    #[tokio::test]
    async fn revision_store_lists_descending_and_dedupes() {
        let store = MemoryRevisionStore::new();
        store.append(revision(1)).await.unwrap();
        store.append(revision(2)).await.unwrap();
        store.append(revision(1)).await.unwrap(); // duplicate version, ignored

        let listed = store
            .list_descending(&"proj1".to_string(), &"feature-x".to_string(), 10)
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].version, Version::try_from_u64(2).unwrap());

        let fetched = store
            .get(&"proj1".to_string(), &"feature-x".to_string(), Version::initial())
            .await
            .unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn revision_store_delete_all_clears_key() {
        let store = MemoryRevisionStore::new();
        store.append(revision(1)).await.unwrap();
        store
            .delete_all(&"proj1".to_string(), &"feature-x".to_string())
            .await
            .unwrap();
        let listed = store
            .list_descending(&"proj1".to_string(), &"feature-x".to_string(), 10)
            .await
            .unwrap();
        assert!(listed.is_empty());
    }
}
