//! crates/docgen_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database driver or web framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

//=========================================================================================
// Task Lifecycle
//=========================================================================================

/// The lifecycle state of a `GenerationTask`. States only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TaskStatus::Pending),
            "processing" => Some(TaskStatus::Processing),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// The only legal moves are pending -> processing -> {completed | failed}.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//=========================================================================================
// Generation Requirements
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    Zh,
    En,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    #[default]
    Academic,
    Business,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::Academic => "academic",
            TemplateType::Business => "business",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "academic" => Some(TemplateType::Academic),
            "business" => Some(TemplateType::Business),
            _ => None,
        }
    }
}

pub const MIN_WORD_COUNT: u32 = 500;
pub const MAX_WORD_COUNT: u32 = 10_000;
pub const DEFAULT_WORD_COUNT: u32 = 2_000;
pub const MAX_TOPIC_CHARS: usize = 500;

/// The structured configuration stored alongside each task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequirements {
    pub word_count: u32,
    pub include_charts: bool,
    pub include_formulas: bool,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub template_type: TemplateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<i32>,
}

impl Default for GenerationRequirements {
    fn default() -> Self {
        Self {
            word_count: DEFAULT_WORD_COUNT,
            include_charts: true,
            include_formulas: true,
            language: Language::default(),
            template_type: TemplateType::default(),
            template_id: None,
        }
    }
}

//=========================================================================================
// Generation Task
//=========================================================================================

/// Where the text of a generated document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    Ai,
    Fallback,
}

impl ContentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentSource::Ai => "ai",
            ContentSource::Fallback => "fallback",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ai" => Some(ContentSource::Ai),
            "fallback" => Some(ContentSource::Fallback),
            _ => None,
        }
    }
}

/// Counts derived from the generated text once a task completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskStatistics {
    pub word_count: u32,
    pub charts_count: u32,
    pub formulas_count: u32,
}

/// One document generation request and its lifecycle.
#[derive(Debug, Clone)]
pub struct GenerationTask {
    pub id: Uuid,
    pub user_id: Uuid,
    pub topic: String,
    pub requirements: GenerationRequirements,
    pub status: TaskStatus,
    /// Path of the generated file, relative to the media root.
    pub generated_file: Option<String>,
    pub file_size: Option<i64>,
    pub file_format: Option<String>,
    pub generated_text: Option<String>,
    pub content_source: Option<ContentSource>,
    pub statistics: TaskStatistics,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl GenerationTask {
    /// Builds a fresh task in the `Pending` state.
    pub fn new(user_id: Uuid, topic: String, requirements: GenerationRequirements) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            topic,
            requirements,
            status: TaskStatus::Pending,
            generated_file: None,
            file_size: None,
            file_format: None,
            generated_text: None,
            content_source: None,
            statistics: TaskStatistics::default(),
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// What a successful pipeline run hands back to the worker.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub generated_file: String,
    pub file_size: i64,
    pub file_format: String,
    pub generated_text: String,
    pub content_source: ContentSource,
    pub statistics: TaskStatistics,
}

//=========================================================================================
// Templates and Plans
//=========================================================================================

#[derive(Debug, Clone)]
pub struct DocumentTemplate {
    pub id: i32,
    pub name: String,
    pub template_type: TemplateType,
    pub description: String,
    /// Optional `.docx` whose styles seed new documents.
    pub file_path: Option<PathBuf>,
    pub is_active: bool,
}

/// Usage limits attached to a subscription plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanLimits {
    pub plan_name: String,
    pub max_documents_per_month: u32,
    pub max_words_per_document: u32,
    pub supports_charts: bool,
    pub supports_formulas: bool,
}

impl PlanLimits {
    /// Limits applied to users without an active subscription.
    pub fn free() -> Self {
        Self {
            plan_name: "free".to_string(),
            max_documents_per_month: 5,
            max_words_per_document: 1_500,
            supports_charts: false,
            supports_formulas: false,
        }
    }
}

//=========================================================================================
// Generated Text
//=========================================================================================

/// Text returned by a `TextGenerationService`, tagged with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedText {
    pub text: String,
    pub source: ContentSource,
}

impl GeneratedText {
    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: ContentSource::Ai,
        }
    }

    pub fn fallback(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: ContentSource::Fallback,
        }
    }
}
