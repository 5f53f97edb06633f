//! HTTP server for the construction daemon.
//!
//! Provides REST API for:
//! - Status and health checks
//! - HDFS listing and source validation
//! - Starting and stopping constructions
//! - Construction metadata and progress
//!
//! plus a WebSocket streaming construction events.

mod http;
pub mod state;
mod websocket;

pub use http::{create_router, status_for, ApiResponse, StatusResponse, CLUSTER_ID_HEADER};
pub use state::AppState;
