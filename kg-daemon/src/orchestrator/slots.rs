//! Keyed lock table: one active construction per cluster.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::CancelSignal;
use crate::error::{KgError, Result};
use crate::storage::ConstructionStatus;

struct Slot {
    graph_id: String,
    job_id: Option<String>,
    phase: ConstructionStatus,
    cancel: CancelSignal,
    since: DateTime<Utc>,
}

/// Snapshot of one held slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotInfo {
    pub cluster_id: String,
    pub graph_id: String,
    /// `validating` until the record exists, then `running`
    pub phase: ConstructionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub since: DateTime<Utc>,
}

/// Table of clusters currently occupied by a construction.
#[derive(Clone, Default)]
pub struct ClusterSlots {
    inner: Arc<Mutex<HashMap<String, Slot>>>,
}

impl ClusterSlots {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Recovering from poisoned cluster slot table");
                poisoned.into_inner()
            }
        }
    }

    /// Claim `cluster_id` for `graph_id`. The slot is released when the
    /// returned guard drops.
    pub fn try_acquire(&self, cluster_id: &str, graph_id: &str) -> Result<SlotGuard> {
        let mut slots = self.lock();
        if let Some(holder) = slots.get(cluster_id) {
            return Err(KgError::Conflict {
                cluster_id: cluster_id.to_string(),
                graph_id: holder.graph_id.clone(),
            });
        }
        let cancel = CancelSignal::new();
        slots.insert(
            cluster_id.to_string(),
            Slot {
                graph_id: graph_id.to_string(),
                job_id: None,
                phase: ConstructionStatus::Validating,
                cancel: cancel.clone(),
                since: Utc::now(),
            },
        );
        Ok(SlotGuard {
            slots: self.clone(),
            cluster_id: cluster_id.to_string(),
            cancel,
        })
    }

    /// Cancel signal of `job_id`, if that job still holds its cluster.
    pub fn cancel_signal(&self, cluster_id: &str, job_id: &str) -> Option<CancelSignal> {
        self.lock()
            .get(cluster_id)
            .filter(|slot| slot.job_id.as_deref() == Some(job_id))
            .map(|slot| slot.cancel.clone())
    }

    /// Held slots, sorted by cluster id.
    pub fn snapshot(&self) -> Vec<SlotInfo> {
        let mut infos: Vec<SlotInfo> = self
            .lock()
            .iter()
            .map(|(cluster_id, slot)| SlotInfo {
                cluster_id: cluster_id.clone(),
                graph_id: slot.graph_id.clone(),
                phase: slot.phase,
                job_id: slot.job_id.clone(),
                since: slot.since,
            })
            .collect();
        infos.sort_by(|a, b| a.cluster_id.cmp(&b.cluster_id));
        infos
    }
}

/// Exclusive hold on one cluster.
pub struct SlotGuard {
    slots: ClusterSlots,
    cluster_id: String,
    cancel: CancelSignal,
}

impl SlotGuard {
    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    /// Record that validation passed and `job_id` was dispatched.
    pub fn mark_running(&self, job_id: &str) {
        if let Some(slot) = self.slots.lock().get_mut(&self.cluster_id) {
            slot.job_id = Some(job_id.to_string());
            slot.phase = ConstructionStatus::Running;
        }
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.slots.lock().remove(&self.cluster_id);
        tracing::debug!(cluster_id = %self.cluster_id, "cluster slot released");
    }
}
