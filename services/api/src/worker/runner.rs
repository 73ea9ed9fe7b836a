//! services/api/src/worker/runner.rs
//!
//! The background workers that drive each generation task through its
//! lifecycle: pending -> processing -> completed | failed.

use docgen_core::ports::{DatabaseService, PortError, PortResult};
use docgen_core::{ContentGenerator, DocumentTemplate, GenerationTask, TaskStatus};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Everything a worker needs to run a task.
pub struct WorkerContext {
    pub db: Arc<dyn DatabaseService>,
    pub generator: Arc<ContentGenerator>,
    pub media_root: PathBuf,
}

/// Starts `count` workers sharing one receiver. Each worker handles one task
/// at a time and stops when the token is cancelled or the queue closes. A
/// task already running is allowed to finish.
pub fn spawn_workers(
    count: usize,
    receiver: mpsc::Receiver<Uuid>,
    ctx: Arc<WorkerContext>,
    shutdown: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let receiver = Arc::new(Mutex::new(receiver));
    (0..count)
        .map(|worker_id| {
            let receiver = receiver.clone();
            let ctx = ctx.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                info!(worker_id, "Generation worker started");
                loop {
                    let next = tokio::select! {
                        _ = shutdown.cancelled() => break,
                        next = async { receiver.lock().await.recv().await } => next,
                    };
                    let Some(task_id) = next else { break };

                    match process_task(&ctx, task_id).await {
                        Ok(Some(status)) => info!(worker_id, %task_id, %status, "Task finished"),
                        Ok(None) => {}
                        Err(e) => {
                            error!(worker_id, %task_id, "Failed to record task result: {}", e)
                        }
                    }
                }
                info!(worker_id, "Generation worker stopped");
            })
        })
        .collect()
}

/// Runs one task to a terminal state.
///
/// Returns `Ok(None)` when the task is gone or already claimed, and the
/// terminal status otherwise. An `Err` means neither outcome could be written
/// back, usually because the task was deleted while it ran.
pub async fn process_task(ctx: &WorkerContext, task_id: Uuid) -> PortResult<Option<TaskStatus>> {
    let task = match ctx.db.get_task(task_id).await {
        Ok(task) => task,
        Err(PortError::NotFound(_)) => {
            warn!(%task_id, "Task disappeared before it could run");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    if !ctx.db.mark_task_processing(task_id).await? {
        warn!(%task_id, status = %task.status, "Task is not pending, skipping");
        return Ok(None);
    }
    info!(%task_id, topic = %task.topic, "Processing generation task");

    match run_generation(ctx, &task).await {
        Ok(outcome) => {
            let Err(e) = ctx.db.complete_task(task_id, &outcome).await else {
                return Ok(Some(TaskStatus::Completed));
            };
            error!(%task_id, "Failed to record completed task: {}", e);
            // The task will not point at this file, whether it ends failed or is gone.
            let path = ctx.media_root.join(&outcome.generated_file);
            if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                warn!(%task_id, "Failed to remove unrecorded document: {}", remove_err);
            }
            match ctx.db.fail_task(task_id, &e.to_string()).await {
                Ok(()) => Ok(Some(TaskStatus::Failed)),
                // Typically the owner deleted the task mid-run.
                Err(fail_err) => {
                    warn!(%task_id, "Failed to mark task failed: {}", fail_err);
                    Err(e)
                }
            }
        }
        Err(e) => {
            error!(%task_id, "Generation failed: {}", e);
            ctx.db.fail_task(task_id, &e.to_string()).await?;
            Ok(Some(TaskStatus::Failed))
        }
    }
}

async fn run_generation(
    ctx: &WorkerContext,
    task: &GenerationTask,
) -> PortResult<docgen_core::TaskOutcome> {
    let template: Option<DocumentTemplate> = match task.requirements.template_id {
        Some(id) => Some(ctx.db.get_template(id).await?),
        None => None,
    };
    ctx.generator
        .generate(task.id, &task.topic, &task.requirements, template.as_ref())
        .await
}
