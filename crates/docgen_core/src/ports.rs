//! crates/docgen_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use uuid::Uuid;

use crate::domain::{
    DocumentTemplate, GeneratedText, GenerationTask, PlanLimits, TaskOutcome, TaskStatus,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth ---
    /// Resolves an auth session id (written by the identity service) to a user id.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    // --- Templates and Plans ---
    async fn list_active_templates(&self) -> PortResult<Vec<DocumentTemplate>>;

    async fn get_template(&self, template_id: i32) -> PortResult<DocumentTemplate>;

    /// Limits of the user's active subscription, or `None` if there is none.
    async fn get_plan_limits(&self, user_id: Uuid) -> PortResult<Option<PlanLimits>>;

    async fn count_tasks_created_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> PortResult<u32>;

    // --- Generation Tasks ---
    /// Inserts the task unless its owner already created `monthly_limit` tasks
    /// since `since`. The count and the insert are atomic per user, so
    /// concurrent submissions cannot overshoot the limit. Returns `false` when
    /// the limit was reached and nothing was inserted.
    async fn create_task_within_limit(
        &self,
        task: &GenerationTask,
        monthly_limit: u32,
        since: DateTime<Utc>,
    ) -> PortResult<bool>;

    async fn get_task(&self, task_id: Uuid) -> PortResult<GenerationTask>;

    /// Like `get_task`, but reports `NotFound` for tasks owned by someone else.
    async fn get_task_for_user(&self, task_id: Uuid, user_id: Uuid) -> PortResult<GenerationTask>;

    /// The user's tasks, newest first.
    async fn list_tasks_for_user(&self, user_id: Uuid) -> PortResult<Vec<GenerationTask>>;

    async fn list_task_ids_with_status(&self, status: TaskStatus) -> PortResult<Vec<Uuid>>;

    /// Moves a task from pending to processing. Returns `false` when the task
    /// was not pending, so that only one worker ever claims it.
    async fn mark_task_processing(&self, task_id: Uuid) -> PortResult<bool>;

    /// Records a successful run. Only applies to a task in `processing`.
    async fn complete_task(&self, task_id: Uuid, outcome: &TaskOutcome) -> PortResult<()>;

    /// Records a failed run. Only applies to a task in `processing`.
    async fn fail_task(&self, task_id: Uuid, error_message: &str) -> PortResult<()>;

    /// Deletes the user's task and returns the removed record.
    async fn delete_task_for_user(&self, task_id: Uuid, user_id: Uuid)
        -> PortResult<GenerationTask>;
}

#[async_trait]
pub trait TextGenerationService: Send + Sync {
    /// Generates text for a prompt. Implementations substitute fallback text
    /// instead of failing, and tag the result accordingly.
    async fn generate(&self, prompt: &str) -> GeneratedText;
}

#[async_trait]
pub trait DocumentAssembler: Send + Sync {
    /// Acquires a fresh, exclusively owned assembly session.
    async fn open_session(&self) -> PortResult<Box<dyn AssemblySession>>;
}

/// A live document being built. Every call is a side effect against the
/// session; none of them are idempotent. A session must be closed on every
/// exit path, and a failed session is discarded rather than retried.
#[async_trait]
pub trait AssemblySession: Send {
    async fn create_document(&mut self, template: Option<&Path>) -> PortResult<()>;

    async fn apply_document_styles(&mut self) -> PortResult<()>;

    /// `level` is 1, 2 or 3.
    async fn insert_heading(&mut self, text: &str, level: u8) -> PortResult<()>;

    async fn insert_paragraph(&mut self, text: &str) -> PortResult<()>;

    async fn insert_table(&mut self, rows: &[Vec<String>]) -> PortResult<()>;

    /// Writes the document to `path` and returns the number of bytes written.
    async fn save(&mut self, path: &Path) -> PortResult<u64>;

    async fn close(self: Box<Self>) -> PortResult<()>;
}
