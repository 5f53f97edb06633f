//! Job orchestrator: starts, monitors and stops constructions.
//!
//! `start` holds the cluster slot while the source is validated, creates the
//! record in `running` and hands the slot to a background worker. `stop`
//! moves a running record to `cancelling` and raises the job's cancel
//! signal; the worker writes the terminal status once the backend returns.

mod events;
mod slots;
mod worker;

pub use events::{ConstructionEvent, EventKind};
pub use slots::{ClusterSlots, SlotGuard, SlotInfo};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::backend::{ConstructionBackend, ConstructionRequest};
use crate::error::{KgError, Result};
use crate::hdfs::{SourceDescriptor, SourceValidator};
use crate::storage::{ConstructionJob, ConstructionStatus, GraphShape, JobPatch, MetaStore};
use worker::Worker;

/// Error recorded on jobs a previous daemon process left active.
pub const INTERRUPTED_BY_RESTART: &str = "interrupted by daemon restart";

const EVENT_CAPACITY: usize = 256;

/// Everything `start` needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructRequest {
    pub graph_id: String,
    pub cluster_id: String,
    pub source: SourceDescriptor,
    #[serde(default)]
    pub shape: GraphShape,
}

/// Graph and cluster ids are opaque, but must be present.
fn require_id(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(KgError::invalid(format!("{} must not be empty", field)));
    }
    if value.chars().any(char::is_control) {
        return Err(KgError::invalid(format!("{} contains control characters", field)));
    }
    Ok(())
}

pub struct Orchestrator {
    store: Arc<MetaStore>,
    validator: Arc<dyn SourceValidator>,
    backend: Arc<dyn ConstructionBackend>,
    slots: ClusterSlots,
    events: broadcast::Sender<ConstructionEvent>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<MetaStore>,
        validator: Arc<dyn SourceValidator>,
        backend: Arc<dyn ConstructionBackend>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            validator,
            backend,
            slots: ClusterSlots::new(),
            events,
        }
    }

    pub fn store(&self) -> &Arc<MetaStore> {
        &self.store
    }

    /// Live construction events. Slow subscribers miss events, never block jobs.
    pub fn subscribe(&self) -> broadcast::Receiver<ConstructionEvent> {
        self.events.subscribe()
    }

    pub fn active_slots(&self) -> Vec<SlotInfo> {
        self.slots.snapshot()
    }

    fn emit(&self, kind: EventKind, job: &ConstructionJob) {
        let _ = self.events.send(ConstructionEvent::from_job(kind, job));
    }

    /// Fail records a previous process left active. Call before serving.
    pub fn recover_interrupted(&self) -> Result<usize> {
        let count = self.store.fail_interrupted(INTERRUPTED_BY_RESTART)?;
        if count > 0 {
            tracing::warn!(count, "failed constructions interrupted by restart");
        }
        Ok(count)
    }

    /// Validate the source and launch a construction.
    ///
    /// Returns the freshly created `running` record; the backend work runs on
    /// a background task. Fails with `Conflict` when the cluster is busy and
    /// with `Unreachable` when validation fails, in which case a `failed`
    /// record is left behind and nothing is dispatched.
    pub async fn start(&self, request: ConstructRequest) -> Result<ConstructionJob> {
        require_id("graphId", &request.graph_id)?;
        require_id("clusterId", &request.cluster_id)?;
        request.source.check()?;

        let ConstructRequest {
            graph_id,
            cluster_id,
            source,
            shape,
        } = request;

        let guard = self.slots.try_acquire(&cluster_id, &graph_id)?;
        tracing::info!(%graph_id, %cluster_id, source = %source.authority(), path = %source.path, "validating source");

        let report = self.validator.validate(&source).await?;
        if let Err(err) = report.require_file() {
            let failed = ConstructionJob::failed(&graph_id, &cluster_id, &source, shape, err.to_string());
            match self.store.create(&failed) {
                Ok(_) => self.emit(EventKind::StatusChanged, &failed),
                Err(e) => tracing::warn!(%graph_id, %cluster_id, error = %e, "could not record failed validation"),
            }
            tracing::warn!(%graph_id, %cluster_id, error = %err, "source validation failed");
            return Err(err);
        }

        let job = ConstructionJob::running(&graph_id, &cluster_id, &source, shape);
        self.open(&job, &guard)?;
        tracing::info!(%graph_id, %cluster_id, job_id = %job.job_id, "construction started");

        let backend_request = ConstructionRequest {
            job_id: job.job_id.clone(),
            graph_id,
            cluster_id,
            source,
            shape,
        };
        self.dispatch(backend_request, guard);

        Ok(job)
    }

    /// Bind the slot to `job`, then persist it.
    ///
    /// The slot must know the job id before the record is visible, so a
    /// `stop` landing before dispatch raises the signal the worker will get.
    /// On a store error the caller drops the guard, which frees the cluster.
    fn open(&self, job: &ConstructionJob, guard: &SlotGuard) -> Result<()> {
        guard.mark_running(&job.job_id);
        self.store.create(job)?;
        self.emit(EventKind::Started, job);
        Ok(())
    }

    fn dispatch(&self, request: ConstructionRequest, guard: SlotGuard) {
        let worker = Worker {
            store: Arc::clone(&self.store),
            backend: Arc::clone(&self.backend),
            events: self.events.clone(),
        };
        tokio::spawn(worker.run(request, guard));
    }

    /// Request cooperative cancellation. Idempotent: terminal and already
    /// cancelling records are returned unchanged.
    pub fn stop(&self, graph_id: &str, cluster_id: &str) -> Result<ConstructionJob> {
        require_id("graphId", graph_id)?;
        require_id("clusterId", cluster_id)?;

        let mut requested = false;
        let job = self.store.modify(graph_id, cluster_id, |job| {
            if job.status == ConstructionStatus::Running {
                JobPatch::status(ConstructionStatus::Cancelling).apply(job)?;
                requested = true;
            }
            Ok(())
        })?;

        if job.status != ConstructionStatus::Cancelling {
            tracing::debug!(%graph_id, %cluster_id, status = %job.status, "stop is a no-op");
            return Ok(job);
        }

        if requested {
            tracing::info!(%graph_id, %cluster_id, job_id = %job.job_id, "stop requested");
            self.emit(EventKind::StatusChanged, &job);
        }

        match self.slots.cancel_signal(cluster_id, &job.job_id) {
            Some(signal) => {
                signal.cancel();
                Ok(job)
            }
            None => {
                // No worker left to acknowledge; settle here
                let job = self.store.modify(graph_id, cluster_id, |job| {
                    if job.status == ConstructionStatus::Cancelling {
                        JobPatch::status(ConstructionStatus::Cancelled).apply(job)?;
                    }
                    Ok(())
                })?;
                tracing::warn!(%graph_id, %cluster_id, status = %job.status, "stopped construction without a worker");
                self.emit(EventKind::StatusChanged, &job);
                Ok(job)
            }
        }
    }

    /// Patch the latest record on a cluster on behalf of an external caller.
    ///
    /// The patch must follow the state machine. When it leaves the job
    /// cancelling or terminal, the running backend is told to stop.
    pub fn update_meta(&self, cluster_id: &str, patch: &JobPatch) -> Result<ConstructionJob> {
        require_id("clusterId", cluster_id)?;
        if patch.is_empty() {
            return Err(KgError::invalid("patch must set status, progress or error"));
        }

        let (before, job) = self.store.update_tracked(cluster_id, patch)?;
        if job == before {
            return Ok(job);
        }

        tracing::info!(
            graph_id = %job.graph_id,
            cluster_id = %job.cluster_id,
            status = %job.status,
            progress = job.progress,
            "construction metadata patched"
        );
        let kind = if job.status == before.status {
            EventKind::Progress
        } else {
            EventKind::StatusChanged
        };
        self.emit(kind, &job);

        if job.status == ConstructionStatus::Cancelling || job.status.is_terminal() {
            if let Some(signal) = self.slots.cancel_signal(cluster_id, &job.job_id) {
                signal.cancel();
            }
        }
        Ok(job)
    }
}
