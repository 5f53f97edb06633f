//! Construction job records and patches.

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

use super::schema::ConstructionStatus;
use crate::error::{KgError, Result};
use crate::hdfs::SourceDescriptor;

/// Shape hints forwarded to the backend.
///
/// The upload form answers these questions with `"y"` / `"n"`, API clients
/// send booleans; both are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphShape {
    #[serde(default = "default_edge_list", deserialize_with = "deserialize_yes_no")]
    pub is_edge_list: bool,
    #[serde(default, deserialize_with = "deserialize_yes_no")]
    pub is_directed: bool,
}

fn default_edge_list() -> bool {
    true
}

impl Default for GraphShape {
    fn default() -> Self {
        Self {
            is_edge_list: true,
            is_directed: false,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum YesNo {
    Bool(bool),
    Text(String),
}

fn deserialize_yes_no<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match YesNo::deserialize(deserializer)? {
        YesNo::Bool(b) => Ok(b),
        YesNo::Text(s) => match s.trim().to_lowercase().as_str() {
            "y" | "yes" | "true" => Ok(true),
            "n" | "no" | "false" => Ok(false),
            other => Err(de::Error::custom(format!("expected y/n, got '{}'", other))),
        },
    }
}

/// One construction record per (graph, cluster) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructionJob {
    /// Fresh id per accepted start
    pub job_id: String,
    pub graph_id: String,
    pub cluster_id: String,
    pub status: ConstructionStatus,
    /// Percentage, 0-100
    pub progress: u8,
    pub source_host: String,
    pub source_port: u16,
    pub source_path: String,
    #[serde(flatten)]
    pub shape: GraphShape,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set only on failed jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConstructionJob {
    fn new(
        graph_id: &str,
        cluster_id: &str,
        source: &SourceDescriptor,
        shape: GraphShape,
        status: ConstructionStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            graph_id: graph_id.to_string(),
            cluster_id: cluster_id.to_string(),
            status,
            progress: 0,
            source_host: source.host.clone(),
            source_port: source.port,
            source_path: source.path.clone(),
            shape,
            started_at: now,
            updated_at: now,
            error: None,
        }
    }

    /// A freshly accepted job, already dispatched.
    pub fn running(
        graph_id: &str,
        cluster_id: &str,
        source: &SourceDescriptor,
        shape: GraphShape,
    ) -> Self {
        Self::new(graph_id, cluster_id, source, shape, ConstructionStatus::Running)
    }

    /// The record left behind by a start whose source failed validation.
    pub fn failed(
        graph_id: &str,
        cluster_id: &str,
        source: &SourceDescriptor,
        shape: GraphShape,
        error: impl Into<String>,
    ) -> Self {
        let mut job = Self::new(graph_id, cluster_id, source, shape, ConstructionStatus::Failed);
        job.error = Some(error.into());
        job
    }

    /// Reconstruct the source descriptor (without the WebHDFS port).
    pub fn source(&self) -> SourceDescriptor {
        SourceDescriptor::new(&self.source_host, self.source_port, &self.source_path)
    }
}

/// Patch over the mutable fields of a record: status, progress, error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPatch {
    #[serde(default)]
    pub status: Option<ConstructionStatus>,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub error: Option<String>,
}

impl JobPatch {
    pub fn status(status: ConstructionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(ConstructionStatus::Failed),
            progress: None,
            error: Some(error.into()),
        }
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.progress.is_none() && self.error.is_none()
    }

    /// Apply to `job` in place. Returns whether anything changed.
    ///
    /// Progress is clamped to 100, never decreases, and is frozen once the
    /// record is terminal.
    pub fn apply(&self, job: &mut ConstructionJob) -> Result<bool> {
        let before = job.status;
        let next = self.status.unwrap_or(before);

        if !before.can_transition_to(next) {
            return Err(KgError::InvalidTransition {
                from: before.to_string(),
                to: next.to_string(),
            });
        }
        if self.error.is_some() && next != ConstructionStatus::Failed {
            return Err(KgError::invalid("error can only be recorded on a failed job"));
        }

        let mut changed = next != before;
        job.status = next;

        if let Some(progress) = self.progress {
            let progress = progress.min(100);
            if !before.is_terminal() && progress > job.progress {
                job.progress = progress;
                changed = true;
            }
        }

        if let Some(error) = &self.error {
            if job.error.as_deref() != Some(error.as_str()) {
                job.error = Some(error.clone());
                changed = true;
            }
        }

        if changed {
            job.updated_at = Utc::now();
        }
        Ok(changed)
    }
}
