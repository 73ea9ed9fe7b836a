//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{error::HttpError, state::AppState};
use crate::worker::EnqueueError;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use docgen_core::domain::{MAX_TOPIC_CHARS, MAX_WORD_COUNT, MIN_WORD_COUNT};
use docgen_core::ports::PortError;
use docgen_core::quota::{check_request, month_start, QuotaViolation};
use docgen_core::{
    DocumentTemplate, GenerationRequirements, GenerationTask, Language, PlanLimits, TemplateType,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Characters of generated text returned by the preview endpoint.
pub const PREVIEW_CHARS: usize = 1000;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        list_templates_handler,
        generate_handler,
        list_tasks_handler,
        get_task_handler,
        preview_handler,
        download_handler,
        delete_task_handler,
    ),
    components(
        schemas(
            GenerateRequest,
            GenerateResponse,
            TaskResponse,
            RequirementsResponse,
            PreviewResponse,
            TemplateResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Document Generation API", description = "Queue AI-written documents and download the results.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// A generation request. Omitted fields take their defaults; omitted chart and
/// formula flags follow what the caller's plan supports.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateRequest {
    pub topic: String,
    pub template_id: Option<i32>,
    /// `academic` or `business`. Ignored when `template_id` is given.
    pub template_type: Option<String>,
    pub word_count: Option<u32>,
    pub include_charts: Option<bool>,
    pub include_formulas: Option<bool>,
    /// `zh` or `en`.
    pub language: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RequirementsResponse {
    pub word_count: u32,
    pub include_charts: bool,
    pub include_formulas: bool,
    pub language: String,
    pub template_type: String,
    pub template_id: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskResponse {
    pub id: Uuid,
    pub topic: String,
    pub status: String,
    pub requirements: RequirementsResponse,
    pub generated_file: Option<String>,
    pub file_size: Option<i64>,
    pub file_format: Option<String>,
    /// `ai` or `fallback` once the task has completed.
    pub content_source: Option<String>,
    pub word_count: u32,
    pub charts_count: u32,
    pub formulas_count: u32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GenerateResponse {
    pub task: TaskResponse,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PreviewResponse {
    pub task_id: Uuid,
    pub status: String,
    pub preview: String,
    pub truncated: bool,
    pub content_source: Option<String>,
    pub word_count: u32,
    pub charts_count: u32,
    pub formulas_count: u32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TemplateResponse {
    pub id: i32,
    pub name: String,
    pub template_type: String,
    pub description: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

fn language_str(language: Language) -> &'static str {
    match language {
        Language::Zh => "zh",
        Language::En => "en",
    }
}

impl From<GenerationTask> for TaskResponse {
    fn from(task: GenerationTask) -> Self {
        let reqs = task.requirements;
        Self {
            id: task.id,
            topic: task.topic,
            status: task.status.to_string(),
            requirements: RequirementsResponse {
                word_count: reqs.word_count,
                include_charts: reqs.include_charts,
                include_formulas: reqs.include_formulas,
                language: language_str(reqs.language).to_string(),
                template_type: reqs.template_type.as_str().to_string(),
                template_id: reqs.template_id,
            },
            generated_file: task.generated_file,
            file_size: task.file_size,
            file_format: task.file_format,
            content_source: task.content_source.map(|s| s.as_str().to_string()),
            word_count: task.statistics.word_count,
            charts_count: task.statistics.charts_count,
            formulas_count: task.statistics.formulas_count,
            error_message: task.error_message,
            created_at: task.created_at,
            completed_at: task.completed_at,
        }
    }
}

impl From<DocumentTemplate> for TemplateResponse {
    fn from(template: DocumentTemplate) -> Self {
        Self {
            id: template.id,
            name: template.name,
            template_type: template.template_type.as_str().to_string(),
            description: template.description,
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness check.
#[utoipa::path(get, path = "/health", responses((status = 200, description = "Service is up")))]
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// List the active document templates.
#[utoipa::path(
    get,
    path = "/api/documents/templates",
    responses(
        (status = 200, description = "Active templates", body = [TemplateResponse]),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn list_templates_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<TemplateResponse>>, HttpError> {
    let templates = app_state.db.list_active_templates().await?;
    Ok(Json(templates.into_iter().map(Into::into).collect()))
}

/// Submit a document generation request.
///
/// The request is checked against the caller's plan, stored as a pending task
/// and queued for the background workers.
#[utoipa::path(
    post,
    path = "/api/documents/generate",
    request_body = GenerateRequest,
    responses(
        (status = 201, description = "Task created", body = GenerateResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Plan limit exceeded", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn generate_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let Json(req) = payload.map_err(|e| HttpError::BadRequest(e.body_text()))?;
    let db = &app_state.db;

    let topic = req.topic.trim();
    if topic.is_empty() {
        return Err(HttpError::BadRequest("Topic is required".to_string()));
    }
    if topic.chars().count() > MAX_TOPIC_CHARS {
        return Err(HttpError::BadRequest(format!(
            "Topic must be at most {} characters",
            MAX_TOPIC_CHARS
        )));
    }

    let word_count = req
        .word_count
        .unwrap_or(GenerationRequirements::default().word_count);
    if !(MIN_WORD_COUNT..=MAX_WORD_COUNT).contains(&word_count) {
        return Err(HttpError::BadRequest(format!(
            "Word count must be between {} and {}",
            MIN_WORD_COUNT, MAX_WORD_COUNT
        )));
    }

    let language = match req.language.as_deref() {
        None | Some("zh") => Language::Zh,
        Some("en") => Language::En,
        Some(other) => {
            return Err(HttpError::BadRequest(format!("Unsupported language '{}'", other)))
        }
    };

    let template = match req.template_id {
        Some(id) => match db.get_template(id).await {
            Ok(template) if template.is_active => Some(template),
            Ok(_) | Err(PortError::NotFound(_)) => {
                return Err(HttpError::BadRequest("Invalid template ID".to_string()))
            }
            Err(e) => return Err(e.into()),
        },
        None => None,
    };
    let template_type = match (&template, req.template_type.as_deref()) {
        (Some(template), _) => template.template_type,
        (None, None) => TemplateType::default(),
        (None, Some(raw)) => TemplateType::parse(raw).ok_or_else(|| {
            HttpError::BadRequest(format!("Unsupported template type '{}'", raw))
        })?,
    };

    let limits = db
        .get_plan_limits(user_id)
        .await?
        .unwrap_or_else(PlanLimits::free);
    let requirements = GenerationRequirements {
        word_count,
        include_charts: req.include_charts.unwrap_or(limits.supports_charts),
        include_formulas: req.include_formulas.unwrap_or(limits.supports_formulas),
        language,
        template_type,
        template_id: template.as_ref().map(|t| t.id),
    };
    let since = month_start(Utc::now());
    let used = db.count_tasks_created_since(user_id, since).await?;
    check_request(&limits, used, &requirements)?;

    let task = GenerationTask::new(user_id, topic.to_string(), requirements);
    if !db
        .create_task_within_limit(&task, limits.max_documents_per_month, since)
        .await?
    {
        return Err(QuotaViolation::MonthlyLimitReached {
            plan: limits.plan_name,
            limit: limits.max_documents_per_month,
        }
        .into());
    }

    // The task is stored either way; one the queue cannot take now stays
    // pending until the sweep or the next startup enqueues it.
    match app_state.queue.try_enqueue(task.id) {
        Ok(()) => info!(task_id = %task.id, %user_id, "Generation task queued"),
        Err(EnqueueError::Full) => {
            warn!(task_id = %task.id, "Task queue is full, leaving task pending")
        }
        Err(EnqueueError::Closed) => {
            error!(task_id = %task.id, "Task queue is closed, leaving task pending")
        }
    }

    let response = GenerateResponse {
        task: task.into(),
        message: "Document generation started".to_string(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// List the caller's generation tasks, newest first.
#[utoipa::path(
    get,
    path = "/api/documents/tasks",
    responses(
        (status = 200, description = "The caller's tasks", body = [TaskResponse]),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn list_tasks_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<Vec<TaskResponse>>, HttpError> {
    let tasks = app_state.db.list_tasks_for_user(user_id).await?;
    Ok(Json(tasks.into_iter().map(Into::into).collect()))
}

/// Get one task.
#[utoipa::path(
    get,
    path = "/api/documents/tasks/{task_id}",
    params(("task_id" = Uuid, Path, description = "The task id")),
    responses(
        (status = 200, description = "The task", body = TaskResponse),
        (status = 404, description = "No such task", body = ErrorResponse)
    )
)]
pub async fn get_task_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskResponse>, HttpError> {
    let task = app_state.db.get_task_for_user(task_id, user_id).await?;
    Ok(Json(task.into()))
}

/// Preview the start of the generated text along with its statistics.
#[utoipa::path(
    get,
    path = "/api/documents/tasks/{task_id}/preview",
    params(("task_id" = Uuid, Path, description = "The task id")),
    responses(
        (status = 200, description = "Preview of the generated text", body = PreviewResponse),
        (status = 404, description = "No such task, or no text yet", body = ErrorResponse)
    )
)]
pub async fn preview_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<PreviewResponse>, HttpError> {
    let task = app_state.db.get_task_for_user(task_id, user_id).await?;
    let text = task
        .generated_text
        .as_deref()
        .ok_or_else(|| HttpError::NotFound("Generated content is not available yet".to_string()))?;

    let preview: String = text.chars().take(PREVIEW_CHARS).collect();
    let truncated = preview.len() < text.len();
    Ok(Json(PreviewResponse {
        task_id: task.id,
        status: task.status.to_string(),
        preview,
        truncated,
        content_source: task.content_source.map(|s| s.as_str().to_string()),
        word_count: task.statistics.word_count,
        charts_count: task.statistics.charts_count,
        formulas_count: task.statistics.formulas_count,
    }))
}

/// Download the generated document.
#[utoipa::path(
    get,
    path = "/api/documents/tasks/{task_id}/download",
    params(("task_id" = Uuid, Path, description = "The task id")),
    responses(
        (status = 200, description = "The .docx file", content_type = "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        (status = 404, description = "No such task, or no file", body = ErrorResponse)
    )
)]
pub async fn download_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(task_id): Path<Uuid>,
) -> Result<Response, HttpError> {
    let task = app_state.db.get_task_for_user(task_id, user_id).await?;
    let not_ready = || HttpError::NotFound("Document file is not available".to_string());
    let relative = task.generated_file.as_deref().ok_or_else(not_ready)?;

    let path = app_state.config.media_root.join(relative);
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(%task_id, path = %path.display(), "Document file missing on disk");
            return Err(not_ready());
        }
        Err(e) => {
            error!(%task_id, "Failed to open document: {}", e);
            return Err(HttpError::Internal);
        }
    };

    let extension = task.file_format.as_deref().unwrap_or("docx");
    let headers = [
        (header::CONTENT_TYPE, DOCX_MIME.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}.{}\"", task.id, extension),
        ),
    ];
    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}

/// Delete a task and its generated file.
#[utoipa::path(
    delete,
    path = "/api/documents/tasks/{task_id}",
    params(("task_id" = Uuid, Path, description = "The task id")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "No such task", body = ErrorResponse)
    )
)]
pub async fn delete_task_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(task_id): Path<Uuid>,
) -> Result<StatusCode, HttpError> {
    let task = app_state.db.delete_task_for_user(task_id, user_id).await?;

    if let Some(relative) = task.generated_file.as_deref() {
        let path = app_state.config.media_root.join(relative);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(%task_id, "Failed to remove document file: {}", e),
        }
    }
    info!(%task_id, "Generation task deleted");
    Ok(StatusCode::NO_CONTENT)
}
