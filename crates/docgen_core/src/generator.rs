//! crates/docgen_core/src/generator.rs
//!
//! The content generation pipeline: prompt, text generation, section parsing,
//! and document assembly within a single scoped assembly session.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{ContentSource, DocumentTemplate, GenerationRequirements, TaskOutcome};
use crate::ports::{AssemblySession, DocumentAssembler, PortResult, TextGenerationService};
use crate::prompts::build_prompt;
use crate::sections::{parse_blocks, Block};
use crate::stats::compute_statistics;

/// Sub-directory of the media root holding generated files.
pub const DOCUMENTS_DIR: &str = "documents";
pub const DOCX_FORMAT: &str = "docx";

pub struct ContentGenerator {
    text_service: Arc<dyn TextGenerationService>,
    assembler: Arc<dyn DocumentAssembler>,
    media_root: PathBuf,
}

impl ContentGenerator {
    pub fn new(
        text_service: Arc<dyn TextGenerationService>,
        assembler: Arc<dyn DocumentAssembler>,
        media_root: PathBuf,
    ) -> Self {
        Self {
            text_service,
            assembler,
            media_root,
        }
    }

    /// Generates a document for `topic` and saves it under the media root.
    ///
    /// Text generation never fails the run; assembly errors do. The assembly
    /// session is closed on every path, and a failure to close is only logged.
    pub async fn generate(
        &self,
        task_id: Uuid,
        topic: &str,
        requirements: &GenerationRequirements,
        template: Option<&DocumentTemplate>,
    ) -> PortResult<TaskOutcome> {
        let prompt = build_prompt(topic, requirements);
        let generated = self.text_service.generate(&prompt).await;
        if generated.source == ContentSource::Fallback {
            warn!(%task_id, "Text generation unavailable, using fallback content");
        }

        let blocks = parse_blocks(&generated.text);
        debug!(%task_id, blocks = blocks.len(), "Parsed generated text");

        let generated_file = format!("{}/{}.{}", DOCUMENTS_DIR, Uuid::new_v4(), DOCX_FORMAT);
        let output_path = self.media_root.join(&generated_file);
        let template_path = template
            .and_then(|t| t.file_path.as_deref())
            .map(|p| self.media_root.join(p));

        let mut session = self.assembler.open_session().await?;
        let assembled =
            assemble(session.as_mut(), &blocks, template_path.as_deref(), &output_path).await;
        if let Err(e) = session.close().await {
            warn!(%task_id, "Failed to close assembly session: {}", e);
        }
        let file_size = assembled?;

        info!(%task_id, file = %generated_file, bytes = file_size, "Document saved");
        Ok(TaskOutcome {
            generated_file,
            file_size: file_size as i64,
            file_format: DOCX_FORMAT.to_string(),
            statistics: compute_statistics(&generated.text),
            generated_text: generated.text,
            content_source: generated.source,
        })
    }
}

async fn assemble(
    session: &mut dyn AssemblySession,
    blocks: &[Block],
    template: Option<&Path>,
    output_path: &Path,
) -> PortResult<u64> {
    session.create_document(template).await?;
    session.apply_document_styles().await?;
    for block in blocks {
        match block {
            Block::Heading { text, level } => session.insert_heading(text, *level).await?,
            Block::Paragraph(text) => session.insert_paragraph(text).await?,
            Block::Table(rows) => session.insert_table(rows).await?,
        }
    }
    session.save(output_path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GeneratedText, Language, TemplateType};
    use crate::ports::PortError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedText(GeneratedText);

    #[async_trait]
    impl TextGenerationService for FixedText {
        async fn generate(&self, _prompt: &str) -> GeneratedText {
            self.0.clone()
        }
    }

    /// Records every session call; optionally fails on the named operation.
    #[derive(Default)]
    struct RecordingAssembler {
        log: Arc<Mutex<Vec<String>>>,
        fail_on: Option<&'static str>,
        fail_open: bool,
    }

    struct RecordingSession {
        log: Arc<Mutex<Vec<String>>>,
        fail_on: Option<&'static str>,
    }

    impl RecordingSession {
        fn record(&self, op: &str, detail: String) -> PortResult<()> {
            self.log.lock().unwrap().push(format!("{op}:{detail}"));
            if self.fail_on == Some(op) {
                return Err(PortError::Unexpected(format!("{op} failed")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DocumentAssembler for RecordingAssembler {
        async fn open_session(&self) -> PortResult<Box<dyn AssemblySession>> {
            if self.fail_open {
                return Err(PortError::Unexpected("office suite unavailable".to_string()));
            }
            Ok(Box::new(RecordingSession {
                log: self.log.clone(),
                fail_on: self.fail_on,
            }))
        }
    }

    #[async_trait]
    impl AssemblySession for RecordingSession {
        async fn create_document(&mut self, template: Option<&Path>) -> PortResult<()> {
            self.record("create", format!("{:?}", template))
        }
        async fn apply_document_styles(&mut self) -> PortResult<()> {
            self.record("style", String::new())
        }
        async fn insert_heading(&mut self, text: &str, level: u8) -> PortResult<()> {
            self.record("heading", format!("{level}:{text}"))
        }
        async fn insert_paragraph(&mut self, text: &str) -> PortResult<()> {
            self.record("paragraph", text.to_string())
        }
        async fn insert_table(&mut self, rows: &[Vec<String>]) -> PortResult<()> {
            self.record("table", rows.len().to_string())
        }
        async fn save(&mut self, path: &Path) -> PortResult<u64> {
            self.record("save", path.display().to_string())?;
            Ok(1234)
        }
        async fn close(self: Box<Self>) -> PortResult<()> {
            self.record("close", String::new())
        }
    }

    fn generator(text: GeneratedText, assembler: RecordingAssembler) -> ContentGenerator {
        ContentGenerator::new(
            Arc::new(FixedText(text)),
            Arc::new(assembler),
            PathBuf::from("/srv/media"),
        )
    }

    fn ops(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        log.lock()
            .unwrap()
            .iter()
            .map(|entry| entry.split(':').next().unwrap_or_default().to_string())
            .collect()
    }

    #[tokio::test]
    async fn assembles_blocks_in_order_and_closes() {
        let assembler = RecordingAssembler::default();
        let log = assembler.log.clone();
        let text = "Abstract\nShort summary [CHART LOCATION]\n| a | b |\n| 1 | 2 |\nConclusion\nDone";
        let gen = generator(GeneratedText::ai(text), assembler);

        let outcome = gen
            .generate(Uuid::new_v4(), "Soil", &GenerationRequirements::default(), None)
            .await
            .unwrap();

        assert_eq!(
            ops(&log),
            vec![
                "create",
                "style",
                "heading",
                "paragraph",
                "table",
                "heading",
                "paragraph",
                "save",
                "close"
            ]
        );
        assert!(outcome.generated_file.starts_with("documents/"));
        assert!(outcome.generated_file.ends_with(".docx"));
        assert_eq!(outcome.file_size, 1234);
        assert_eq!(outcome.file_format, "docx");
        assert_eq!(outcome.content_source, ContentSource::Ai);
        assert_eq!(outcome.statistics.charts_count, 1);
        assert_eq!(outcome.generated_text, text);
    }

    #[tokio::test]
    async fn failed_insert_still_closes_session() {
        let assembler = RecordingAssembler {
            fail_on: Some("heading"),
            ..RecordingAssembler::default()
        };
        let log = assembler.log.clone();
        let gen = generator(GeneratedText::ai("Introduction\nbody"), assembler);

        let err = gen
            .generate(Uuid::new_v4(), "Soil", &GenerationRequirements::default(), None)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("heading failed"));
        assert_eq!(ops(&log), vec!["create", "style", "heading", "close"]);
    }

    #[tokio::test]
    async fn close_error_does_not_mask_success() {
        let assembler = RecordingAssembler {
            fail_on: Some("close"),
            ..RecordingAssembler::default()
        };
        let gen = generator(GeneratedText::ai("plain text"), assembler);
        assert!(gen
            .generate(Uuid::new_v4(), "Soil", &GenerationRequirements::default(), None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn session_open_failure_is_fatal() {
        let assembler = RecordingAssembler {
            fail_open: true,
            ..RecordingAssembler::default()
        };
        let gen = generator(GeneratedText::ai("text"), assembler);
        let err = gen
            .generate(Uuid::new_v4(), "Soil", &GenerationRequirements::default(), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("office suite unavailable"));
    }

    #[tokio::test]
    async fn fallback_content_is_tagged_and_counted() {
        let assembler = RecordingAssembler::default();
        let gen = generator(
            GeneratedText::fallback(crate::prompts::FALLBACK_CONTENT),
            assembler,
        );
        let reqs = GenerationRequirements {
            language: Language::Zh,
            template_type: TemplateType::Academic,
            ..GenerationRequirements::default()
        };

        let outcome = gen
            .generate(Uuid::new_v4(), "气候变化对农业的影响", &reqs, None)
            .await
            .unwrap();

        assert_eq!(outcome.content_source, ContentSource::Fallback);
        assert_eq!(outcome.statistics.charts_count, 2);
        assert_eq!(outcome.statistics.formulas_count, 2);
        assert!(outcome.statistics.word_count > 0);
    }

    #[tokio::test]
    async fn template_path_resolves_under_media_root() {
        let assembler = RecordingAssembler::default();
        let log = assembler.log.clone();
        let gen = generator(GeneratedText::ai("text"), assembler);
        let template = DocumentTemplate {
            id: 1,
            name: "Academic".to_string(),
            template_type: TemplateType::Academic,
            description: String::new(),
            file_path: Some(PathBuf::from("templates/academic.docx")),
            is_active: true,
        };

        gen.generate(
            Uuid::new_v4(),
            "Soil",
            &GenerationRequirements::default(),
            Some(&template),
        )
        .await
        .unwrap();

        let first = log.lock().unwrap()[0].clone();
        assert!(first.contains("/srv/media/templates/academic.docx"));
    }
}
