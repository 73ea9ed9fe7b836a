//! In-memory stand-ins for the ports, shared by the worker and web tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docgen_core::ports::{
    AssemblySession, DatabaseService, DocumentAssembler, PortError, PortResult,
    TextGenerationService,
};
use docgen_core::{
    DocumentTemplate, GeneratedText, GenerationTask, PlanLimits, TaskOutcome, TaskStatus,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
struct Store {
    sessions: HashMap<String, Uuid>,
    templates: Vec<DocumentTemplate>,
    plans: HashMap<Uuid, PlanLimits>,
    tasks: HashMap<Uuid, GenerationTask>,
    transitions: HashMap<Uuid, Vec<TaskStatus>>,
}

/// A `DatabaseService` over plain maps. Status changes follow the same
/// pending -> processing -> terminal rules as the SQL adapter.
#[derive(Default)]
pub struct InMemoryDb {
    store: Mutex<Store>,
    count_delay: Mutex<Option<Duration>>,
    fail_completions: AtomicBool,
}

impl InMemoryDb {
    /// Makes `count_tasks_created_since` answer only after `delay`, like a
    /// round trip to a real database.
    pub fn set_count_delay(&self, delay: Duration) {
        *self.count_delay.lock().unwrap() = Some(delay);
    }

    /// Makes every `complete_task` call fail as if the connection dropped.
    pub fn fail_completions(&self) {
        self.fail_completions.store(true, Ordering::SeqCst);
    }

    /// Registers a new user reachable through the `session_id` cookie value.
    pub fn add_user_session(&self, session_id: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        self.store
            .lock()
            .unwrap()
            .sessions
            .insert(session_id.to_string(), user_id);
        user_id
    }

    pub fn add_template(&self, template: DocumentTemplate) {
        self.store.lock().unwrap().templates.push(template);
    }

    pub fn set_plan(&self, user_id: Uuid, limits: PlanLimits) {
        self.store.lock().unwrap().plans.insert(user_id, limits);
    }

    pub fn insert_task(&self, task: GenerationTask) {
        let mut store = self.store.lock().unwrap();
        store.transitions.insert(task.id, vec![task.status]);
        store.tasks.insert(task.id, task);
    }

    pub fn task(&self, task_id: Uuid) -> GenerationTask {
        self.store.lock().unwrap().tasks[&task_id].clone()
    }

    pub fn task_count(&self) -> usize {
        self.store.lock().unwrap().tasks.len()
    }

    /// Every status the task has held, in order.
    pub fn transitions(&self, task_id: Uuid) -> Vec<TaskStatus> {
        self.store
            .lock()
            .unwrap()
            .transitions
            .get(&task_id)
            .cloned()
            .unwrap_or_default()
    }

    fn transition(
        &self,
        task_id: Uuid,
        next: TaskStatus,
        apply: impl FnOnce(&mut GenerationTask),
    ) -> PortResult<bool> {
        let mut store = self.store.lock().unwrap();
        let Some(task) = store.tasks.get_mut(&task_id) else {
            return Err(PortError::NotFound(format!("Task {} not found", task_id)));
        };
        if !task.status.can_transition_to(next) {
            return Ok(false);
        }
        task.status = next;
        apply(task);
        store.transitions.entry(task_id).or_default().push(next);
        Ok(true)
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        self.store
            .lock()
            .unwrap()
            .sessions
            .get(session_id)
            .copied()
            .ok_or(PortError::Unauthorized)
    }

    async fn list_active_templates(&self) -> PortResult<Vec<DocumentTemplate>> {
        let store = self.store.lock().unwrap();
        Ok(store.templates.iter().filter(|t| t.is_active).cloned().collect())
    }

    async fn get_template(&self, template_id: i32) -> PortResult<DocumentTemplate> {
        let store = self.store.lock().unwrap();
        store
            .templates
            .iter()
            .find(|t| t.id == template_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Template {} not found", template_id)))
    }

    async fn get_plan_limits(&self, user_id: Uuid) -> PortResult<Option<PlanLimits>> {
        Ok(self.store.lock().unwrap().plans.get(&user_id).cloned())
    }

    async fn count_tasks_created_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> PortResult<u32> {
        let count = count_since(&self.store.lock().unwrap(), user_id, since);
        let delay = *self.count_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(count)
    }

    async fn create_task_within_limit(
        &self,
        task: &GenerationTask,
        monthly_limit: u32,
        since: DateTime<Utc>,
    ) -> PortResult<bool> {
        let mut store = self.store.lock().unwrap();
        if count_since(&store, task.user_id, since) >= monthly_limit {
            return Ok(false);
        }
        store.transitions.insert(task.id, vec![task.status]);
        store.tasks.insert(task.id, task.clone());
        Ok(true)
    }

    async fn get_task(&self, task_id: Uuid) -> PortResult<GenerationTask> {
        self.store
            .lock()
            .unwrap()
            .tasks
            .get(&task_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Task {} not found", task_id)))
    }

    async fn get_task_for_user(&self, task_id: Uuid, user_id: Uuid) -> PortResult<GenerationTask> {
        match self.get_task(task_id).await {
            Ok(task) if task.user_id == user_id => Ok(task),
            Ok(_) => Err(PortError::NotFound(format!("Task {} not found", task_id))),
            Err(e) => Err(e),
        }
    }

    async fn list_tasks_for_user(&self, user_id: Uuid) -> PortResult<Vec<GenerationTask>> {
        let store = self.store.lock().unwrap();
        let mut tasks: Vec<GenerationTask> = store
            .tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn list_task_ids_with_status(&self, status: TaskStatus) -> PortResult<Vec<Uuid>> {
        let store = self.store.lock().unwrap();
        let mut tasks: Vec<&GenerationTask> =
            store.tasks.values().filter(|t| t.status == status).collect();
        tasks.sort_by_key(|t| t.created_at);
        Ok(tasks.into_iter().map(|t| t.id).collect())
    }

    async fn mark_task_processing(&self, task_id: Uuid) -> PortResult<bool> {
        match self.transition(task_id, TaskStatus::Processing, |_| {}) {
            Err(PortError::NotFound(_)) => Ok(false),
            other => other,
        }
    }

    async fn complete_task(&self, task_id: Uuid, outcome: &TaskOutcome) -> PortResult<()> {
        if self.fail_completions.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("connection reset".to_string()));
        }
        let applied = self.transition(task_id, TaskStatus::Completed, |task| {
            task.generated_file = Some(outcome.generated_file.clone());
            task.file_size = Some(outcome.file_size);
            task.file_format = Some(outcome.file_format.clone());
            task.generated_text = Some(outcome.generated_text.clone());
            task.content_source = Some(outcome.content_source);
            task.statistics = outcome.statistics;
            task.completed_at = Some(Utc::now());
        })?;
        if !applied {
            return Err(PortError::Unexpected(format!(
                "Task {} is not processing and cannot be completed",
                task_id
            )));
        }
        Ok(())
    }

    async fn fail_task(&self, task_id: Uuid, error_message: &str) -> PortResult<()> {
        let applied = self.transition(task_id, TaskStatus::Failed, |task| {
            task.error_message = Some(error_message.to_string());
            task.completed_at = Some(Utc::now());
        })?;
        if !applied {
            return Err(PortError::Unexpected(format!(
                "Task {} is not processing and cannot be failed",
                task_id
            )));
        }
        Ok(())
    }

    async fn delete_task_for_user(
        &self,
        task_id: Uuid,
        user_id: Uuid,
    ) -> PortResult<GenerationTask> {
        let mut store = self.store.lock().unwrap();
        match store.tasks.get(&task_id) {
            Some(task) if task.user_id == user_id => {}
            _ => return Err(PortError::NotFound(format!("Task {} not found", task_id))),
        }
        store.transitions.remove(&task_id);
        store
            .tasks
            .remove(&task_id)
            .ok_or_else(|| PortError::NotFound(format!("Task {} not found", task_id)))
    }
}

fn count_since(store: &Store, user_id: Uuid, since: DateTime<Utc>) -> u32 {
    store
        .tasks
        .values()
        .filter(|t| t.user_id == user_id && t.created_at >= since)
        .count() as u32
}

/// Always returns the same text.
pub struct FixedText(pub GeneratedText);

#[async_trait]
impl TextGenerationService for FixedText {
    async fn generate(&self, _prompt: &str) -> GeneratedText {
        self.0.clone()
    }
}

/// An assembler whose sessions can never be opened.
pub struct FailingAssembler;

#[async_trait]
impl DocumentAssembler for FailingAssembler {
    async fn open_session(&self) -> PortResult<Box<dyn AssemblySession>> {
        Err(PortError::Unexpected("office suite unavailable".to_string()))
    }
}
