//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docgen_core::domain::{
    ContentSource, DocumentTemplate, GenerationRequirements, GenerationTask, PlanLimits,
    TaskOutcome, TaskStatistics, TaskStatus, TemplateType,
};
use docgen_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::path::PathBuf;
use uuid::Uuid;

const TASK_COLUMNS: &str = "id, user_id, topic, requirements, status, generated_file, file_size, \
     file_format, generated_text, content_source, word_count, charts_count, formulas_count, \
     error_message, created_at, completed_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct TaskRecord {
    id: Uuid,
    user_id: Uuid,
    topic: String,
    requirements: Json<GenerationRequirements>,
    status: String,
    generated_file: Option<String>,
    file_size: Option<i64>,
    file_format: Option<String>,
    generated_text: Option<String>,
    content_source: Option<String>,
    word_count: i32,
    charts_count: i32,
    formulas_count: i32,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}
impl TaskRecord {
    fn to_domain(self) -> PortResult<GenerationTask> {
        let status = TaskStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!("Task {} has unknown status '{}'", self.id, self.status))
        })?;
        Ok(GenerationTask {
            id: self.id,
            user_id: self.user_id,
            topic: self.topic,
            requirements: self.requirements.0,
            status,
            generated_file: self.generated_file,
            file_size: self.file_size,
            file_format: self.file_format,
            generated_text: self.generated_text,
            content_source: self.content_source.as_deref().and_then(ContentSource::parse),
            statistics: TaskStatistics {
                word_count: self.word_count.max(0) as u32,
                charts_count: self.charts_count.max(0) as u32,
                formulas_count: self.formulas_count.max(0) as u32,
            },
            error_message: self.error_message,
            created_at: self.created_at,
            completed_at: self.completed_at,
        })
    }
}

#[derive(FromRow)]
struct TemplateRecord {
    id: i32,
    name: String,
    template_type: String,
    description: String,
    file_path: Option<String>,
    is_active: bool,
}
impl TemplateRecord {
    fn to_domain(self) -> PortResult<DocumentTemplate> {
        let template_type = TemplateType::parse(&self.template_type).ok_or_else(|| {
            PortError::Unexpected(format!(
                "Template {} has unknown type '{}'",
                self.id, self.template_type
            ))
        })?;
        Ok(DocumentTemplate {
            id: self.id,
            name: self.name,
            template_type,
            description: self.description,
            file_path: self.file_path.map(PathBuf::from),
            is_active: self.is_active,
        })
    }
}

#[derive(FromRow)]
struct PlanRecord {
    name: String,
    max_documents_per_month: i32,
    max_words_per_document: i32,
    supports_charts: bool,
    supports_formulas: bool,
}
impl PlanRecord {
    fn to_domain(self) -> PlanLimits {
        PlanLimits {
            plan_name: self.name,
            max_documents_per_month: self.max_documents_per_month.max(0) as u32,
            max_words_per_document: self.max_words_per_document.max(0) as u32,
            supports_charts: self.supports_charts,
            supports_formulas: self.supports_formulas,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        user_id.ok_or(PortError::Unauthorized)
    }

    async fn list_active_templates(&self) -> PortResult<Vec<DocumentTemplate>> {
        let records = sqlx::query_as::<_, TemplateRecord>(
            "SELECT id, name, template_type, description, file_path, is_active \
             FROM document_templates WHERE is_active ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_template(&self, template_id: i32) -> PortResult<DocumentTemplate> {
        let record = sqlx::query_as::<_, TemplateRecord>(
            "SELECT id, name, template_type, description, file_path, is_active \
             FROM document_templates WHERE id = $1",
        )
        .bind(template_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Template {} not found", template_id))
            }
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn get_plan_limits(&self, user_id: Uuid) -> PortResult<Option<PlanLimits>> {
        let record = sqlx::query_as::<_, PlanRecord>(
            "SELECT p.name, p.max_documents_per_month, p.max_words_per_document, \
                    p.supports_charts, p.supports_formulas \
             FROM user_subscriptions s \
             JOIN subscription_plans p ON p.id = s.plan_id \
             WHERE s.user_id = $1 AND s.is_active AND s.end_date > NOW() AND p.is_active",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(|r| r.to_domain()))
    }

    async fn count_tasks_created_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> PortResult<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM generation_tasks WHERE user_id = $1 AND created_at >= $2",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(count.max(0) as u32)
    }

    async fn create_task_within_limit(
        &self,
        task: &GenerationTask,
        monthly_limit: u32,
        since: DateTime<Utc>,
    ) -> PortResult<bool> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // Serializes submissions per user until the transaction ends.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(task.user_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        let used: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM generation_tasks WHERE user_id = $1 AND created_at >= $2",
        )
        .bind(task.user_id)
        .bind(since)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;
        if used >= i64::from(monthly_limit) {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO generation_tasks (id, user_id, topic, requirements, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(task.id)
        .bind(task.user_id)
        .bind(&task.topic)
        .bind(Json(&task.requirements))
        .bind(task.status.as_str())
        .bind(task.created_at)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(true)
    }

    async fn get_task(&self, task_id: Uuid) -> PortResult<GenerationTask> {
        let record = sqlx::query_as::<_, TaskRecord>(&format!(
            "SELECT {TASK_COLUMNS} FROM generation_tasks WHERE id = $1"
        ))
        .bind(task_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Task {} not found", task_id)),
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn get_task_for_user(&self, task_id: Uuid, user_id: Uuid) -> PortResult<GenerationTask> {
        let record = sqlx::query_as::<_, TaskRecord>(&format!(
            "SELECT {TASK_COLUMNS} FROM generation_tasks WHERE id = $1 AND user_id = $2"
        ))
        .bind(task_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Task {} not found", task_id)),
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn list_tasks_for_user(&self, user_id: Uuid) -> PortResult<Vec<GenerationTask>> {
        let records = sqlx::query_as::<_, TaskRecord>(&format!(
            "SELECT {TASK_COLUMNS} FROM generation_tasks WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn list_task_ids_with_status(&self, status: TaskStatus) -> PortResult<Vec<Uuid>> {
        sqlx::query_scalar(
            "SELECT id FROM generation_tasks WHERE status = $1 ORDER BY created_at ASC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn mark_task_processing(&self, task_id: Uuid) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE generation_tasks SET status = 'processing' WHERE id = $1 AND status = 'pending'",
        )
        .bind(task_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(result.rows_affected() == 1)
    }

    async fn complete_task(&self, task_id: Uuid, outcome: &TaskOutcome) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE generation_tasks SET status = 'completed', generated_file = $2, file_size = $3, \
                 file_format = $4, generated_text = $5, content_source = $6, word_count = $7, \
                 charts_count = $8, formulas_count = $9, completed_at = NOW() \
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(task_id)
        .bind(&outcome.generated_file)
        .bind(outcome.file_size)
        .bind(&outcome.file_format)
        .bind(&outcome.generated_text)
        .bind(outcome.content_source.as_str())
        .bind(outcome.statistics.word_count as i32)
        .bind(outcome.statistics.charts_count as i32)
        .bind(outcome.statistics.formulas_count as i32)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::Unexpected(format!(
                "Task {} is not processing and cannot be completed",
                task_id
            )));
        }
        Ok(())
    }

    async fn fail_task(&self, task_id: Uuid, error_message: &str) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE generation_tasks SET status = 'failed', error_message = $2, completed_at = NOW() \
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(task_id)
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
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
        let record = sqlx::query_as::<_, TaskRecord>(&format!(
            "DELETE FROM generation_tasks WHERE id = $1 AND user_id = $2 RETURNING {TASK_COLUMNS}"
        ))
        .bind(task_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Task {} not found", task_id)))?;

        record.to_domain()
    }
}
