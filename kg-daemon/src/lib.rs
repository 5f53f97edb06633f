//! KG Daemon Library - knowledge-graph construction orchestration.
//!
//! This library provides:
//! - Source validation against HDFS (TCP probe + WebHDFS)
//! - Construction metadata store (DuckDB)
//! - Job orchestrator with per-cluster exclusivity and cooperative cancellation
//! - Progress reporting
//! - HTTP command surface (axum)

pub mod backend;
pub mod config;
pub mod error;
pub mod hdfs;
pub mod orchestrator;
pub mod progress;
pub mod server;
pub mod storage;

pub use error::{KgError, Result};
