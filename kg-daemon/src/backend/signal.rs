//! Channels between a running construction and its worker.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Where a backend pushes progress percentages.
///
/// Reports are applied in order; out-of-order or decreasing values are
/// harmless because the metadata store never lowers progress.
#[derive(Clone, Debug)]
pub struct ProgressSink {
    tx: mpsc::UnboundedSender<u8>,
}

impl ProgressSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<u8>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns false once nobody listens anymore.
    pub fn report(&self, percent: u8) -> bool {
        self.tx.send(percent.min(100)).is_ok()
    }
}

/// Cooperative cancellation flag.
///
/// Set once by `stop`, observed by the backend at its own safe points.
/// Clones share the flag.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `cancel` has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}
