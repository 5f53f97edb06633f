//! Storage layer for construction metadata.
//!
//! Provides DuckDB-based storage with:
//! - Schema management
//! - The construction status state machine
//! - Keyed construction records with atomic patches

mod job;
mod metastore;
mod schema;

pub use job::{ConstructionJob, GraphShape, JobPatch};
pub use metastore::MetaStore;
pub use schema::{ConstructionStatus, SCHEMA_VERSION};
