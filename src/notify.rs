//! Best-effort "device has new data" notification queue.
//!
//! Connection handlers publish a device identifier after every accepted
//! batch; observers drain the queue periodically and treat its contents
//! purely as a hint to re-read the registry. Delivery is deliberately
//! unreliable: a full queue drops the publish rather than blocking the
//! producer, so ingestion throughput is never coupled to a slow or absent
//! consumer. The registry remains the ground truth.

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tracing::debug;

/// Bounded many-producer, single-drainer queue of device identifiers.
pub struct NotifyQueue {
    tx: mpsc::Sender<String>,
    rx: Mutex<mpsc::Receiver<String>>,
}

impl NotifyQueue {
    /// Create a queue holding at most `capacity` undelivered hints.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Publish a hint without blocking.
    ///
    /// Returns `false` when the queue was full and the hint was dropped.
    /// Dropping is never an error condition, only an optimization miss.
    pub fn publish(&self, device_id: &str) -> bool {
        match self.tx.try_send(device_id.to_string()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(device = %device_id, "notification queue full, hint dropped");
                false
            }
            // The queue owns its receiver, so the channel cannot close
            // before the queue itself is dropped.
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Remove and return every queued hint, oldest first.
    pub async fn drain_all(&self) -> Vec<String> {
        let mut rx = self.rx.lock().await;
        let mut drained = Vec::new();
        while let Ok(device_id) = rx.try_recv() {
            drained.push(device_id);
        }
        drained
    }
}
