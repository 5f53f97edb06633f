//! Construction status state machine and the DuckDB schema.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a knowledge-graph construction job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructionStatus {
    NotStarted,
    /// Source is being probed; the cluster slot is already held
    Validating,
    Running,
    /// Stop requested, waiting for the backend to acknowledge
    Cancelling,
    Completed,
    Failed,
    Cancelled,
}

impl ConstructionStatus {
    pub const ALL: [ConstructionStatus; 7] = [
        ConstructionStatus::NotStarted,
        ConstructionStatus::Validating,
        ConstructionStatus::Running,
        ConstructionStatus::Cancelling,
        ConstructionStatus::Completed,
        ConstructionStatus::Failed,
        ConstructionStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConstructionStatus::NotStarted => "not_started",
            ConstructionStatus::Validating => "validating",
            ConstructionStatus::Running => "running",
            ConstructionStatus::Cancelling => "cancelling",
            ConstructionStatus::Completed => "completed",
            ConstructionStatus::Failed => "failed",
            ConstructionStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a status name. Accepts `running`, `Running` and `not_started`/`NotStarted`.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "notstarted" => Some(ConstructionStatus::NotStarted),
            "validating" => Some(ConstructionStatus::Validating),
            "running" => Some(ConstructionStatus::Running),
            "cancelling" => Some(ConstructionStatus::Cancelling),
            "completed" => Some(ConstructionStatus::Completed),
            "failed" => Some(ConstructionStatus::Failed),
            "cancelled" => Some(ConstructionStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConstructionStatus::Completed | ConstructionStatus::Failed | ConstructionStatus::Cancelled
        )
    }

    /// Active jobs occupy their cluster.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConstructionStatus::Validating
                | ConstructionStatus::Running
                | ConstructionStatus::Cancelling
        )
    }

    /// Whether `next` is a legal successor. Staying in the same status is always legal.
    pub fn can_transition_to(&self, next: ConstructionStatus) -> bool {
        use ConstructionStatus::*;
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (NotStarted, Validating)
                | (Validating, Running)
                | (Validating, Failed)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelling)
                | (Cancelling, Cancelled)
                | (Cancelling, Completed)
                | (Cancelling, Failed)
        )
    }
}

impl fmt::Display for ConstructionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// SQL fragment matching active statuses, kept in sync with `is_active`.
pub const ACTIVE_STATUS_SQL: &str = "('validating', 'running', 'cancelling')";

/// SQL schema for the construction metadata database.
pub const SCHEMA_SQL: &str = r#"
-- One row per (graph, cluster) pair; overwritten only after a terminal status
CREATE TABLE IF NOT EXISTS constructions (
    graph_id VARCHAR NOT NULL,
    cluster_id VARCHAR NOT NULL,
    job_id VARCHAR NOT NULL,
    status VARCHAR NOT NULL,
    progress INTEGER NOT NULL DEFAULT 0,
    source_host VARCHAR NOT NULL,
    source_port INTEGER NOT NULL,
    source_path VARCHAR NOT NULL,
    is_edge_list BOOLEAN NOT NULL DEFAULT TRUE,
    is_directed BOOLEAN NOT NULL DEFAULT FALSE,
    error VARCHAR,
    started_at BIGINT NOT NULL,
    updated_at BIGINT NOT NULL,
    PRIMARY KEY (graph_id, cluster_id)
);

-- Metadata table: version info
CREATE TABLE IF NOT EXISTS metadata (
    key VARCHAR PRIMARY KEY,
    value VARCHAR
);

-- cluster_id is never updated in place, so indexing it is safe under DuckDB's update model
CREATE INDEX IF NOT EXISTS idx_constructions_cluster ON constructions(cluster_id);
"#;

/// Schema version for migrations
pub const SCHEMA_VERSION: &str = "1.0.0";
