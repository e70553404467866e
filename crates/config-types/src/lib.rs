#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **config-types** – Shared value types and wire format for the replicated
//! configuration engine.
//!
//! Dependency-light and side-effect free: no I/O, no clock reads outside the
//! `leader_time` field callers stamp explicitly. Every other crate in the
//! engine depends on this one.

pub mod command;
pub mod error;
pub mod record;
pub mod version;

pub use command::{
    ApplyOutcome, ApplyRejection, Command, CommandEnvelope, ConfigKey, ProjectId, SchemaId,
    COMMAND_SCHEMA_VERSION,
};
pub use error::{ConfigError, ConfigResult};
pub use record::{ConfigRecord, Revision};
pub use version::Version;
