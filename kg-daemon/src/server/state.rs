//! Shared application state for the server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

use crate::hdfs::{SourceValidator, WebHdfsClient};
use crate::orchestrator::{ConstructionEvent, Orchestrator};
use crate::progress::ProgressReporter;
use crate::storage::MetaStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Starts and stops constructions
    pub orchestrator: Arc<Orchestrator>,
    /// Construction metadata
    pub store: Arc<MetaStore>,
    pub progress: ProgressReporter,
    pub validator: Arc<dyn SourceValidator>,
    /// Directory listings
    pub webhdfs: WebHdfsClient,
    /// Cluster ids with a configured construction service
    pub clusters: Vec<String>,
    pub start_time: Instant,
    pub ws_connections: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        validator: Arc<dyn SourceValidator>,
        webhdfs: WebHdfsClient,
        clusters: Vec<String>,
    ) -> Self {
        let store = Arc::clone(orchestrator.store());
        Self {
            progress: ProgressReporter::new(Arc::clone(&store)),
            orchestrator,
            store,
            validator,
            webhdfs,
            clusters,
            start_time: Instant::now(),
            ws_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Subscribe to construction events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConstructionEvent> {
        self.orchestrator.subscribe()
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::Relaxed)
    }
}
