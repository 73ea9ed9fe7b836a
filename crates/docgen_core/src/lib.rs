pub mod domain;
pub mod generator;
pub mod ports;
pub mod prompts;
pub mod quota;
pub mod sections;
pub mod stats;

pub use domain::{
    ContentSource, DocumentTemplate, GeneratedText, GenerationRequirements, GenerationTask,
    Language, PlanLimits, TaskOutcome, TaskStatistics, TaskStatus, TemplateType,
};
pub use generator::ContentGenerator;
pub use ports::{
    AssemblySession, DatabaseService, DocumentAssembler, PortError, PortResult,
    TextGenerationService,
};
