//! FIFO ring of connected workers.

use peloton_core::{WorkerId, WorkerTask};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Notify;

/// Send side of one worker connection.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    pub id: WorkerId,
    pub outbox: UnboundedSender<WorkerTask>,
}

/// Round-robin ring of worker connections.
///
/// Pop-send-requeue happens under one lock so two routes dispatching at the
/// same time never hand the same ring position to both.
#[derive(Debug, Default)]
pub struct WorkerRing {
    ring: Mutex<VecDeque<WorkerHandle>>,
    available: Notify,
}

impl WorkerRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: WorkerHandle) {
        self.lock().push_back(handle);
        self.available.notify_one();
    }

    pub fn remove(&self, id: WorkerId) -> bool {
        let mut ring = self.lock();
        let before = ring.len();
        ring.retain(|w| w.id != id);
        ring.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Hand `task` to the next worker in the ring.
    ///
    /// Workers whose connection has already closed are dropped from the ring
    /// and the next one is tried. Returns `None` once the ring is empty.
    pub fn send_next(&self, mut task: WorkerTask) -> Option<WorkerId> {
        let mut ring = self.lock();
        while let Some(head) = ring.pop_front() {
            match head.outbox.send(task) {
                Ok(()) => {
                    let id = head.id;
                    ring.push_back(head);
                    return Some(id);
                }
                Err(returned) => {
                    tracing::warn!("Dropping {} from ring: connection closed", head.id);
                    task = returned.0;
                }
            }
        }
        None
    }

    /// Wait until at least one worker is registered.
    pub async fn wait_for_worker(&self) {
        loop {
            if !self.is_empty() {
                return;
            }
            self.available.notified().await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<WorkerHandle>> {
        self.ring.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
