#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **config-engine** – the replicated, schema-validated, optimistically-locked
//! configuration engine: the replicated state machine, the leader-side write
//! pipeline, and the client read path, wired on top of `raft-core` consensus,
//! `config-schema` validation, and the `config-store-core` collaborator
//! traits.

pub mod config;
pub mod engine;
pub mod metrics;
pub mod state_machine;

pub use config::EngineConfig;
pub use engine::{ConfigEngine, API_KEY_PREFIX};
pub use metrics::EngineMetrics;
pub use state_machine::ConfigStateMachine;
