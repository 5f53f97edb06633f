//! Background task driving one construction from dispatch to a terminal status.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::events::{ConstructionEvent, EventKind};
use super::slots::SlotGuard;
use crate::backend::{BackendOutcome, ConstructionBackend, ConstructionRequest, ProgressSink};
use crate::error::{KgError, Result};
use crate::storage::{ConstructionStatus, JobPatch, MetaStore};

const ABORTED_WITHOUT_STOP: &str = "backend aborted the construction without a stop request";

/// Everything a worker needs besides its request and slot.
#[derive(Clone)]
pub(super) struct Worker {
    pub store: Arc<MetaStore>,
    pub backend: Arc<dyn ConstructionBackend>,
    pub events: broadcast::Sender<ConstructionEvent>,
}

impl Worker {
    /// Run the backend, mirror its progress into the store, then settle the
    /// record. The cluster slot is released only after the terminal write.
    pub async fn run(self, request: ConstructionRequest, guard: SlotGuard) {
        let (sink, mut progress_rx) = ProgressSink::channel();
        let backend = Arc::clone(&self.backend);
        let mut work = AssertUnwindSafe(backend.construct(
            request.clone(),
            sink,
            guard.cancel_signal(),
        ))
        .catch_unwind();

        let result = loop {
            tokio::select! {
                biased;
                Some(percent) = progress_rx.recv() => self.record_progress(&request, percent),
                result = &mut work => break result,
            }
        };
        while let Ok(percent) = progress_rx.try_recv() {
            self.record_progress(&request, percent);
        }

        let result =
            result.unwrap_or_else(|_| Err(KgError::backend("construction backend panicked")));
        self.settle(&request, result);
        drop(guard);
    }

    fn record_progress(&self, request: &ConstructionRequest, percent: u8) {
        let mut changed = false;
        let updated = self
            .store
            .modify(&request.graph_id, &request.cluster_id, |job| {
                if job.job_id == request.job_id {
                    changed = JobPatch::progress(percent).apply(job)?;
                }
                Ok(())
            });
        match updated {
            Ok(job) if changed => {
                tracing::debug!(
                    graph_id = %job.graph_id,
                    cluster_id = %job.cluster_id,
                    job_id = %job.job_id,
                    progress = job.progress,
                    "construction progress"
                );
                let _ = self.events.send(ConstructionEvent::from_job(EventKind::Progress, &job));
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(
                job_id = %request.job_id,
                error = %e,
                "failed to record progress"
            ),
        }
    }

    fn settle(&self, request: &ConstructionRequest, result: Result<BackendOutcome>) {
        let mut before = None;
        let settled = self
            .store
            .modify(&request.graph_id, &request.cluster_id, |job| {
                if job.job_id != request.job_id || job.status.is_terminal() {
                    return Ok(());
                }
                before = Some(job.status);
                let patch = match &result {
                    // Completion wins over a stop that raced it
                    Ok(BackendOutcome::Completed) => {
                        JobPatch::status(ConstructionStatus::Completed).with_progress(100)
                    }
                    Ok(BackendOutcome::Cancelled) if job.status == ConstructionStatus::Cancelling => {
                        JobPatch::status(ConstructionStatus::Cancelled)
                    }
                    Ok(BackendOutcome::Cancelled) => JobPatch::failed(ABORTED_WITHOUT_STOP),
                    Err(e) => JobPatch::failed(e.to_string()),
                };
                patch.apply(job)?;
                Ok(())
            });

        let job = match settled {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(
                    graph_id = %request.graph_id,
                    cluster_id = %request.cluster_id,
                    job_id = %request.job_id,
                    error = %e,
                    "failed to record construction outcome"
                );
                return;
            }
        };

        if before.is_none() {
            tracing::info!(
                graph_id = %job.graph_id,
                cluster_id = %job.cluster_id,
                job_id = %request.job_id,
                status = %job.status,
                "record already settled, backend outcome ignored"
            );
            return;
        }

        match job.status {
            ConstructionStatus::Failed => tracing::error!(
                graph_id = %job.graph_id,
                cluster_id = %job.cluster_id,
                job_id = %job.job_id,
                error = job.error.as_deref().unwrap_or_default(),
                "construction failed"
            ),
            status => tracing::info!(
                graph_id = %job.graph_id,
                cluster_id = %job.cluster_id,
                job_id = %job.job_id,
                status = %status,
                progress = job.progress,
                "construction finished"
            ),
        }
        let _ = self
            .events
            .send(ConstructionEvent::from_job(EventKind::StatusChanged, &job));
    }
}
