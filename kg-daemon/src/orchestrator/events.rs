//! Construction lifecycle events, broadcast to live subscribers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::storage::{ConstructionJob, ConstructionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Record created and work dispatched
    Started,
    Progress,
    StatusChanged,
}

/// One observed change of a construction record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructionEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub graph_id: String,
    pub cluster_id: String,
    pub job_id: String,
    pub status: ConstructionStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ConstructionEvent {
    pub fn from_job(kind: EventKind, job: &ConstructionJob) -> Self {
        Self {
            kind,
            graph_id: job.graph_id.clone(),
            cluster_id: job.cluster_id.clone(),
            job_id: job.job_id.clone(),
            status: job.status,
            progress: job.progress,
            error: job.error.clone(),
            timestamp: job.updated_at,
        }
    }
}
