#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **config-store-core** – trait boundaries for the configuration engine's
//! external collaborators (project lookup, schema documents, revision log)
//! and the canonical snapshot codec the RSM uses for log compaction.

pub mod error;
pub mod snapshot;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use snapshot::{Snapshot, SnapshotEntry, SNAPSHOT_SCHEMA_VERSION};
pub use traits::{ProjectRepository, RevisionStore, SchemaRepository};
