//! Engine-level configuration knobs, layered over [`raft_core::RaftConfig`].
//!
//! Mirrors `RaftConfig`'s builder shape: a `Default`, a `new` for the
//! required identity fields, `with_*` setters, and an explicit `validate`.

use std::path::PathBuf;
use std::time::Duration;

use config_types::{ConfigError, ConfigResult};
use raft_core::RaftConfig;

/// Configuration knobs recognised by the configuration engine. `node_id`,
/// `peers`, and the timing fields map directly onto the underlying
/// consensus configuration; `bind_addr`, `data_dir`, `bootstrap`,
/// `snapshot_interval`/`snapshot_threshold`, and `apply_timeout` are engine
/// concerns layered on top.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Stable unique identifier in the consensus cluster.
    pub node_id: u64,
    /// Other members of the cluster.
    pub peers: Vec<u64>,
    /// Peer transport address this node binds to.
    pub bind_addr: String,
    /// Local durable storage for consensus log & snapshots.
    pub data_dir: PathBuf,
    /// If true on exactly one node of a new cluster, forms initial membership.
    pub bootstrap: bool,
    /// Interval between heartbeat messages when leader.
    pub heartbeat_interval: Duration,
    /// Minimum election timeout.
    pub election_timeout_min: Duration,
    /// Maximum election timeout.
    pub election_timeout_max: Duration,
    /// How often the engine should consider taking a snapshot.
    pub snapshot_interval: Duration,
    /// Number of applied log entries that should trigger a snapshot.
    pub snapshot_threshold: usize,
    /// The write pipeline's per-proposal deadline.
    pub apply_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            node_id: 1,
            peers: vec![],
            bind_addr: "127.0.0.1:7000".to_string(),
            data_dir: PathBuf::from("./data"),
            bootstrap: false,
            heartbeat_interval: Duration::from_millis(50),
            election_timeout_min: Duration::from_millis(150),
            election_timeout_max: Duration::from_millis(300),
            snapshot_interval: Duration::from_secs(300),
            snapshot_threshold: 10_000,
            apply_timeout: Duration::from_secs(5),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with the given node identity and peers.
    pub fn new(node_id: u64, peers: Vec<u64>) -> Self {
        Self {
            node_id,
            peers,
            ..Default::default()
        }
    }

    /// Set the peer transport bind address.
    pub fn with_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Set the local durable storage directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Mark this node as the one that bootstraps a new cluster.
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set heartbeat interval.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set election timeout range.
    pub fn with_election_timeout(mut self, min: Duration, max: Duration) -> Self {
        self.election_timeout_min = min;
        self.election_timeout_max = max;
        self
    }

    /// Set log compaction policy.
    pub fn with_snapshot_policy(mut self, interval: Duration, threshold: usize) -> Self {
        self.snapshot_interval = interval;
        self.snapshot_threshold = threshold;
        self
    }

    /// Set the write pipeline's per-proposal deadline.
    pub fn with_apply_timeout(mut self, timeout: Duration) -> Self {
        self.apply_timeout = timeout;
        self
    }

    /// Validate the configuration before the engine starts.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.node_id == 0 {
            return Err(ConfigError::Internal("node_id cannot be zero".to_string()));
        }
        if self.peers.contains(&self.node_id) {
            return Err(ConfigError::Internal(
                "peer list cannot contain the node's own id".to_string(),
            ));
        }
        if self.apply_timeout.is_zero() {
            return Err(ConfigError::Internal(
                "apply_timeout must be greater than zero".to_string(),
            ));
        }
        if self.snapshot_threshold == 0 {
            return Err(ConfigError::Internal(
                "snapshot_threshold must be greater than zero".to_string(),
            ));
        }
        self.raft_config()
            .validate()
            .map_err(|e| ConfigError::Internal(e.to_string()))
    }

    /// Project the consensus-relevant subset of this configuration onto a
    /// [`RaftConfig`] for the underlying node.
    pub fn raft_config(&self) -> RaftConfig {
        RaftConfig::new(self.node_id, self.peers.clone())
            .with_heartbeat_interval(self.heartbeat_interval)
            .with_election_timeout(self.election_timeout_min, self.election_timeout_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_self_in_peers() {
        let config = EngineConfig::new(1, vec![1, 2]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_apply_timeout() {
        let config = EngineConfig::new(1, vec![2, 3]).with_apply_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_pattern_sets_fields() {
        let config = EngineConfig::new(1, vec![2])
            .with_bind_addr("0.0.0.0:9000")
            .with_bootstrap(true)
            .with_snapshot_policy(Duration::from_secs(60), 500)
            .with_apply_timeout(Duration::from_millis(750));

        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert!(config.bootstrap);
        assert_eq!(config.snapshot_threshold, 500);
        assert_eq!(config.apply_timeout, Duration::from_millis(750));
        assert!(config.validate().is_ok());
    }
}
