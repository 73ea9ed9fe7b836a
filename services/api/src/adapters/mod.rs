pub mod db;
pub mod docx;
pub mod text_llm;

pub use db::DbAdapter;
pub use docx::DocxAssembler;
pub use text_llm::OpenAiTextAdapter;
