//! Read-only progress view over the metadata store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::storage::{ConstructionJob, ConstructionStatus, MetaStore};

/// Status and percentage of one construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub graph_id: String,
    pub cluster_id: String,
    pub job_id: String,
    pub status: ConstructionStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<ConstructionJob> for ProgressReport {
    fn from(job: ConstructionJob) -> Self {
        Self {
            graph_id: job.graph_id,
            cluster_id: job.cluster_id,
            job_id: job.job_id,
            status: job.status,
            progress: job.progress,
            error: job.error,
            updated_at: job.updated_at,
        }
    }
}

/// Every call reads the store directly, so reports always reflect the
/// latest committed update.
#[derive(Clone)]
pub struct ProgressReporter {
    store: Arc<MetaStore>,
}

impl ProgressReporter {
    pub fn new(store: Arc<MetaStore>) -> Self {
        Self { store }
    }

    /// Progress of the most recent construction of `graph_id`.
    pub fn get_progress(&self, graph_id: &str) -> Result<ProgressReport> {
        self.store.get(graph_id).map(ProgressReport::from)
    }

    /// Progress of every active construction.
    pub fn in_progress(&self) -> Result<Vec<ProgressReport>> {
        Ok(self
            .store
            .list_in_progress()?
            .into_iter()
            .map(ProgressReport::from)
            .collect())
    }
}
