//! Construction backends: whatever actually builds the graph on a cluster.

mod remote;
mod signal;

pub use remote::RemoteBackend;
pub use signal::{CancelSignal, ProgressSink};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hdfs::SourceDescriptor;
use crate::storage::GraphShape;

/// Work order handed to a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructionRequest {
    pub job_id: String,
    pub graph_id: String,
    pub cluster_id: String,
    pub source: SourceDescriptor,
    #[serde(flatten)]
    pub shape: GraphShape,
}

/// How a construction ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOutcome {
    Completed,
    /// The backend observed the cancel signal and stopped
    Cancelled,
}

/// A distributed construction engine.
///
/// Implementations push progress into `progress`, check `cancel` at their own
/// safe points and return once the remote work has ended. Errors become the
/// `error` of a failed record.
#[async_trait]
pub trait ConstructionBackend: Send + Sync {
    async fn construct(
        &self,
        request: ConstructionRequest,
        progress: ProgressSink,
        cancel: CancelSignal,
    ) -> Result<BackendOutcome>;
}
