pub mod queue;
pub mod runner;

pub use queue::{requeue_pending, spawn_pending_sweep, sweep_pending, EnqueueError, TaskQueue};
pub use runner::{process_task, spawn_workers, WorkerContext};
