//! The write pipeline and client read path: the leader-side orchestration
//! that ties consensus (`raft-core`), schema validation (`config-schema`),
//! and the revision log (`config-store-core`) together.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tracing::warn;
use uuid::Uuid;

use config_schema::validate as validate_schema;
use config_store_core::traits::{ProjectRepository, RevisionStore, SchemaRepository};
use config_types::command::{Command, ConfigKey, ProjectId, SchemaId};
use config_types::record::Revision;
use config_types::version::Version;
use config_types::{ApplyOutcome, CommandEnvelope, ConfigError, ConfigResult};
use raft_core::{ClientRequest, ClientResponse, MessageReceiver, MessageSender, RaftNode};

use crate::config::EngineConfig;
use crate::metrics::EngineMetrics;
use crate::state_machine::ConfigStateMachine;

/// API keys presented to the client read path must look like this prefix
/// followed by 32 alphanumeric characters.
pub const API_KEY_PREFIX: &str = "cfg_";

fn is_valid_api_key_format(api_key: &str) -> bool {
    match api_key.strip_prefix(API_KEY_PREFIX) {
        Some(rest) => rest.len() == 32 && rest.chars().all(|c| c.is_ascii_alphanumeric()),
        None => false,
    }
}

/// Correlation-future registration table (§4.3.1): keyed by the command's
/// correlation id, bounded by in-flight proposals, entries removed on
/// delivery or on `applyTimeout` expiry.
type PendingTable = Arc<DashMap<Uuid, oneshot::Sender<ConfigResult<ApplyOutcome>>>>;

/// The replicated, schema-validated, optimistically-locked configuration
/// engine. Generic over its three external collaborators so tests can wire
/// in-memory implementations and production callers wire durable ones.
pub struct ConfigEngine<P, S, R>
where
    P: ProjectRepository,
    S: SchemaRepository,
    R: RevisionStore,
{
    config: EngineConfig,
    state: Arc<RwLock<ConfigStateMachine>>,
    client_request_tx: mpsc::UnboundedSender<ClientRequest>,
    pending: PendingTable,
    projects: Arc<P>,
    schemas: Arc<S>,
    revisions: Arc<R>,
    sequence: AtomicU64,
}

impl<P, S, R> ConfigEngine<P, S, R>
where
    P: ProjectRepository + 'static,
    S: SchemaRepository + 'static,
    R: RevisionStore + 'static,
{
    /// Build the engine and its consensus node. The caller owns the node's
    /// lifecycle (`tokio::spawn(node.run())`) and its peer transport: actual
    /// network delivery of `Message`s between replicas is delegated, per the
    /// consensus transport's external-collaborator contract.
    pub fn new(
        config: EngineConfig,
        projects: Arc<P>,
        schemas: Arc<S>,
        revisions: Arc<R>,
        message_sender: MessageSender,
        message_receiver: MessageReceiver,
        shutdown: broadcast::Receiver<()>,
    ) -> ConfigResult<(Self, RaftNode)> {
        config.validate()?;

        let state = Arc::new(RwLock::new(ConfigStateMachine::new()));
        let state_machine: Arc<RwLock<dyn raft_core::StateMachine>> = state.clone();

        let (client_request_tx, client_request_rx) = mpsc::unbounded_channel();
        let (client_response_tx, mut client_response_rx) = mpsc::unbounded_channel();

        let node = RaftNode::new(
            config.raft_config(),
            state_machine,
            message_sender,
            message_receiver,
            client_request_rx,
            client_response_tx,
            shutdown,
        )
        .map_err(|e| ConfigError::Internal(e.to_string()))?;

        let pending: PendingTable = Arc::new(DashMap::new());
        let demux_pending = pending.clone();
        tokio::spawn(async move {
            while let Some(response) = client_response_rx.recv().await {
                let waiter = demux_pending.remove(&response.message_id).map(|(_, tx)| tx);
                let Some(waiter) = waiter else { continue };
                let _ = waiter.send(Self::interpret_response(response));
            }
        });

        Ok((
            Self {
                config,
                state,
                client_request_tx,
                pending,
                projects,
                schemas,
                revisions,
                sequence: AtomicU64::new(0),
            },
            node,
        ))
    }

    fn interpret_response(response: ClientResponse) -> ConfigResult<ApplyOutcome> {
        if response.success {
            match response.data {
                Some(bytes) => bincode::deserialize::<ApplyOutcome>(&bytes)
                    .map_err(|e| ConfigError::Internal(e.to_string())),
                None => Err(ConfigError::Internal(
                    "apply response carried no data".to_string(),
                )),
            }
        } else {
            Err(ConfigError::NotLeader {
                hint: response.leader_hint.map(|id| id.to_string()),
            })
        }
    }

    /// Propose a command and await its application through the correlation
    /// future, honouring the configured apply timeout (§5: every write takes
    /// a hard timeout on the apply future; `Timeout` is indeterminate, not a
    /// failure of the proposal itself).
    async fn submit_command(
        &self,
        command: Command,
        leader_time: DateTime<Utc>,
    ) -> ConfigResult<ApplyOutcome> {
        let envelope = CommandEnvelope::new(command, leader_time);
        let correlation_id = envelope.correlation_id;
        let bytes = envelope.encode()?;

        let (tx, rx) = oneshot::channel();
        self.pending.insert(correlation_id, tx);

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let request = ClientRequest {
            message_id: correlation_id,
            client_id: self.config.node_id.to_string(),
            sequence,
            command: bytes,
            read_only: false,
        };

        if self.client_request_tx.send(request).is_err() {
            self.pending.remove(&correlation_id);
            return Err(ConfigError::ConsensusUnavailable {
                message: "raft node is not running".to_string(),
            });
        }

        match tokio::time::timeout(self.config.apply_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                self.pending.remove(&correlation_id);
                Err(ConfigError::ConsensusUnavailable {
                    message: "raft node stopped before the proposal was applied".to_string(),
                })
            }
            Err(_) => {
                self.pending.remove(&correlation_id);
                Err(ConfigError::Timeout)
            }
        }
    }

    /// Record the revision resulting from a successful apply. Per §4.5 step
    /// 6 and §9: if this write fails, the configuration state has already
    /// advanced, so the failure is logged as a warning and not surfaced —
    /// the live state is authoritative, the audit entry best-effort.
    async fn record_revision(
        &self,
        project_id: ProjectId,
        key: ConfigKey,
        author: String,
        leader_time: DateTime<Utc>,
        version: Version,
        content: serde_json::Value,
    ) {
        let revision = Revision {
            revision_id: Uuid::new_v4(),
            project_id: project_id.clone(),
            config_key: key.clone(),
            version,
            content,
            created_by: author,
            created_at: leader_time,
        };
        if let Err(e) = self.revisions.append(revision).await {
            warn!(
                project_id = %project_id,
                key = %key,
                version = version.get(),
                error = %e,
                "revision write failed after configuration state already advanced"
            );
        }
    }

    async fn finish_write(
        &self,
        project_id: ProjectId,
        key: ConfigKey,
        author: String,
        leader_time: DateTime<Utc>,
        outcome: ApplyOutcome,
    ) -> ConfigResult<(Version, serde_json::Value)> {
        match outcome {
            ApplyOutcome::Applied { version, content } => {
                self.record_revision(
                    project_id,
                    key,
                    author,
                    leader_time,
                    version,
                    content.clone(),
                )
                .await;
                Ok((version, content))
            }
            ApplyOutcome::Rejected(rejection) => Err(rejection.into()),
        }
    }

    /// Insert a new configuration. Fails without proposing if the content
    /// does not validate against `schema_id`.
    pub async fn create(
        &self,
        project_id: ProjectId,
        key: ConfigKey,
        schema_id: SchemaId,
        content: serde_json::Value,
        author: String,
    ) -> ConfigResult<(Version, serde_json::Value)> {
        let schema_doc = self
            .schemas
            .schema_document(&schema_id)
            .await?
            .ok_or_else(|| ConfigError::SchemaNotFound {
                schema_id: schema_id.clone(),
            })?;
        validate_schema(&schema_doc, &content).map_err(schema_error_to_config)?;

        let leader_time = Utc::now();
        let command = Command::Create {
            project_id: project_id.clone(),
            key: key.clone(),
            schema_id,
            content,
            author: author.clone(),
        };
        let outcome = self.submit_command(command, leader_time).await?;
        self.finish_write(project_id, key, author, leader_time, outcome).await
    }

    /// Replace an existing configuration's content, subject to the
    /// `expected_version` precondition. The schema is resolved from the
    /// record's current binding, read from local RSM state.
    pub async fn update(
        &self,
        project_id: ProjectId,
        key: ConfigKey,
        expected_version: u64,
        content: serde_json::Value,
        author: String,
    ) -> ConfigResult<(Version, serde_json::Value)> {
        let schema_id = {
            let state = self.state.read().await;
            state
                .get(&project_id, &key)
                .ok_or(ConfigError::NotFound)?
                .schema_id
        };
        let schema_doc = self
            .schemas
            .schema_document(&schema_id)
            .await?
            .ok_or(ConfigError::SchemaNotFound { schema_id })?;
        validate_schema(&schema_doc, &content).map_err(schema_error_to_config)?;

        let leader_time = Utc::now();
        let command = Command::Update {
            project_id: project_id.clone(),
            key: key.clone(),
            expected_version,
            content,
            author: author.clone(),
        };
        let outcome = self.submit_command(command, leader_time).await?;
        self.finish_write(project_id, key, author, leader_time, outcome).await
    }

    /// Remove a configuration and cascade-delete its revisions.
    pub async fn delete(&self, project_id: ProjectId, key: ConfigKey, author: String) -> ConfigResult<()> {
        let leader_time = Utc::now();
        let command = Command::Delete {
            project_id: project_id.clone(),
            key: key.clone(),
            author,
        };
        match self.submit_command(command, leader_time).await? {
            ApplyOutcome::Applied { .. } => {
                if let Err(e) = self.revisions.delete_all(&project_id, &key).await {
                    warn!(project_id = %project_id, key = %key, error = %e, "cascade revision delete failed");
                }
                Ok(())
            }
            ApplyOutcome::Rejected(rejection) => Err(rejection.into()),
        }
    }

    /// Restore a configuration's content from a historical revision as a
    /// new, monotonically-versioned mutation.
    pub async fn rollback(
        &self,
        project_id: ProjectId,
        key: ConfigKey,
        target_version: u64,
        author: String,
    ) -> ConfigResult<(Version, serde_json::Value)> {
        let version = Version::try_from_u64(target_version)?;
        let revision = self
            .revisions
            .get(&project_id, &key, version)
            .await?
            .ok_or(ConfigError::NotFound)?;

        let leader_time = Utc::now();
        let command = Command::Rollback {
            project_id: project_id.clone(),
            key: key.clone(),
            target_version,
            content: revision.content,
            author: author.clone(),
        };
        let outcome = self.submit_command(command, leader_time).await?;
        self.finish_write(project_id, key, author, leader_time, outcome).await
    }

    /// List the revision history for a configuration, newest first.
    pub async fn list_revisions(
        &self,
        project_id: &ProjectId,
        key: &ConfigKey,
        limit: usize,
    ) -> ConfigResult<Vec<Revision>> {
        Ok(self.revisions.list_descending(project_id, key, limit).await?)
    }

    /// Read local RSM state as an already-authorized operator (management
    /// API path — authorization itself is an external collaborator's
    /// concern, not the core's).
    pub async fn read_local(
        &self,
        project_id: &ProjectId,
        key: &ConfigKey,
    ) -> ConfigResult<(Version, serde_json::Value)> {
        let state = self.state.read().await;
        let record = state.get(project_id, key).ok_or(ConfigError::NotFound)?;
        Ok((record.version, record.content))
    }

    /// The unauthenticated client read path: project API key plus
    /// configuration key, served from local applied state.
    pub async fn client_read(
        &self,
        api_key: &str,
        key: &ConfigKey,
    ) -> ConfigResult<(Version, serde_json::Value)> {
        if !is_valid_api_key_format(api_key) {
            return Err(ConfigError::InvalidApiKey);
        }
        let project_id = self
            .projects
            .resolve_by_api_key(api_key)
            .await?
            .ok_or(ConfigError::UnknownApiKey)?;
        self.read_local(&project_id, key).await
    }

    /// A point-in-time snapshot of engine health.
    pub async fn metrics(&self) -> EngineMetrics {
        EngineMetrics {
            applied_index: self.state.read().await.applied_index(),
            pending_proposals: self.pending.len(),
        }
    }
}

fn schema_error_to_config(e: config_schema::SchemaError) -> ConfigError {
    let path = e.path().map(|p| p.to_string());
    ConfigError::ValidationFailed {
        path,
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_format_requires_prefix_and_length() {
        let good = format!("{}{}", API_KEY_PREFIX, "a".repeat(32));
        assert!(is_valid_api_key_format(&good));
        assert!(!is_valid_api_key_format("cfg_tooshort"));
        assert!(!is_valid_api_key_format(&"a".repeat(36)));
        assert!(!is_valid_api_key_format(&format!(
            "cfg_{}!",
            "a".repeat(31)
        )));
    }
}
