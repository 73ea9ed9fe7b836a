//! services/api/src/worker/queue.rs
//!
//! The in-process queue between the web handlers and the background workers.

use docgen_core::ports::{DatabaseService, PortError, PortResult};
use docgen_core::TaskStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("Task queue is full")]
    Full,
    #[error("Task queue is closed")]
    Closed,
}

/// A cloneable handle for enqueueing task ids.
#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::Sender<Uuid>,
    /// Set when an id was turned away because the queue was full.
    overflowed: Arc<AtomicBool>,
}

impl TaskQueue {
    /// Creates a queue holding at most `capacity` waiting ids, along with the
    /// receiving end the workers consume.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<Uuid>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let queue = Self {
            sender,
            overflowed: Arc::new(AtomicBool::new(false)),
        };
        (queue, receiver)
    }

    /// Waits for room in the queue, then enqueues the id.
    pub async fn enqueue(&self, task_id: Uuid) -> PortResult<()> {
        self.sender
            .send(task_id)
            .await
            .map_err(|_| PortError::Unexpected("Task queue is closed".to_string()))
    }

    /// Enqueues the id without waiting. A full queue remembers that it turned
    /// an id away so the next sweep can retry.
    pub fn try_enqueue(&self, task_id: Uuid) -> Result<(), EnqueueError> {
        match self.sender.try_send(task_id) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.overflowed.store(true, Ordering::SeqCst);
                Err(EnqueueError::Full)
            }
            Err(TrySendError::Closed(_)) => Err(EnqueueError::Closed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn take_overflow(&self) -> bool {
        self.overflowed.swap(false, Ordering::SeqCst)
    }
}

/// Re-enqueues every task still pending. The queue lives in memory, so ids
/// enqueued before a restart are otherwise lost.
pub async fn requeue_pending(db: &dyn DatabaseService, queue: &TaskQueue) -> PortResult<usize> {
    let pending = db.list_task_ids_with_status(TaskStatus::Pending).await?;
    let count = pending.len();
    for task_id in pending {
        queue.enqueue(task_id).await?;
    }
    if count > 0 {
        info!(count, "Re-enqueued pending generation tasks");
    }
    Ok(count)
}

/// After an overflow, offers pending tasks to the queue again until it fills
/// up. Ids already waiting may be offered twice; a worker skips any task it
/// cannot claim.
pub async fn sweep_pending(db: &dyn DatabaseService, queue: &TaskQueue) -> PortResult<usize> {
    if !queue.take_overflow() {
        return Ok(0);
    }
    let mut offered = 0;
    for task_id in db.list_task_ids_with_status(TaskStatus::Pending).await? {
        match queue.try_enqueue(task_id) {
            Ok(()) => offered += 1,
            Err(EnqueueError::Full) => break,
            Err(EnqueueError::Closed) => {
                return Err(PortError::Unexpected("Task queue is closed".to_string()))
            }
        }
    }
    if offered > 0 {
        info!(offered, "Offered pending generation tasks to the queue again");
    }
    Ok(offered)
}

/// Runs `sweep_pending` every `interval` until the token is cancelled.
pub fn spawn_pending_sweep(
    db: Arc<dyn DatabaseService>,
    queue: TaskQueue,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {
                    if queue.is_closed() {
                        warn!("Task queue closed, stopping pending sweep");
                        break;
                    }
                    if let Err(e) = sweep_pending(db.as_ref(), &queue).await {
                        error!("Pending sweep failed: {}", e);
                    }
                }
            }
        }
    })
}
