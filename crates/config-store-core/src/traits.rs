//! Narrow async trait boundaries for the external collaborators the engine
//! reads from but never owns: project lookup, schema documents, and the
//! revision (audit) log.
//!
//! These mirror the shape of `toka_auth::TokenValidator` and
//! `toka_store_core::StorageBackend`: a minimal object-safe async trait the
//! core depends on, with the concrete persistence left to the surrounding
//! application.

use async_trait::async_trait;

use config_types::command::{ConfigKey, ProjectId, SchemaId};
use config_types::record::Revision;
use config_types::version::Version;

use crate::error::StoreResult;

/// Resolves an opaque project API key to a project identifier.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Look up the project owning `api_key`, if any.
    async fn resolve_by_api_key(&self, api_key: &str) -> StoreResult<Option<ProjectId>>;
}

/// Fetches schema documents by id.
#[async_trait]
pub trait SchemaRepository: Send + Sync {
    /// Fetch the JSON Schema document identified by `schema_id`, if it exists.
    async fn schema_document(
        &self,
        schema_id: &SchemaId,
    ) -> StoreResult<Option<serde_json::Value>>;
}

/// Append-only, queryable log of accepted mutations.
#[async_trait]
pub trait RevisionStore: Send + Sync {
    /// Record a new revision. Idempotent per `(project_id, config_key, version)`.
    async fn append(&self, revision: Revision) -> StoreResult<()>;

    /// Fetch the revision recorded at exactly `version`.
    async fn get(
        &self,
        project_id: &ProjectId,
        key: &ConfigKey,
        version: Version,
    ) -> StoreResult<Option<Revision>>;

    /// List the most recent revisions for `(project_id, key)`, newest first.
    async fn list_descending(
        &self,
        project_id: &ProjectId,
        key: &ConfigKey,
        limit: usize,
    ) -> StoreResult<Vec<Revision>>;

    /// Remove all revisions for `(project_id, key)` — cascades a configuration delete.
    async fn delete_all(&self, project_id: &ProjectId, key: &ConfigKey) -> StoreResult<()>;
}
