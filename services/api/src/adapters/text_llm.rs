//! services/api/src/adapters/text_llm.rs
//!
//! This module contains the adapter for the document-writing LLM.
//! It implements the `TextGenerationService` port from the `core` crate against
//! any OpenAI-compatible chat completions endpoint (DeepSeek by default).

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
    Client,
};
use async_trait::async_trait;
use docgen_core::{
    domain::GeneratedText, ports::TextGenerationService, prompts::FALLBACK_CONTENT,
};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::AiConfig;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TextGenerationService` using an OpenAI-compatible LLM.
///
/// Without an API key every call returns the fallback content.
#[derive(Clone)]
pub struct OpenAiTextAdapter {
    client: Option<Client<OpenAIConfig>>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiTextAdapter {
    /// Creates a new `OpenAiTextAdapter` from the text generation settings.
    pub fn new(config: &AiConfig) -> Self {
        let client = config.api_key.as_ref().map(|key| {
            Client::with_config(
                OpenAIConfig::new()
                    .with_api_base(config.api_base.clone())
                    .with_api_key(key.clone()),
            )
        });
        Self {
            client,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: config.timeout,
        }
    }

    async fn request(&self, client: &Client<OpenAIConfig>, prompt: &str) -> Result<String, String> {
        let messages = vec![ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e: OpenAIError| e.to_string())?
            .into()];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .build()
            .map_err(|e: OpenAIError| e.to_string())?;

        let response = tokio::time::timeout(self.timeout, client.chat().create(request))
            .await
            .map_err(|_| format!("request timed out after {:?}", self.timeout))?
            .map_err(|e: OpenAIError| e.to_string())?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| "response contained no text content".to_string())
    }
}

//=========================================================================================
// `TextGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextGenerationService for OpenAiTextAdapter {
    /// Generates document text; any failure yields the fallback content.
    async fn generate(&self, prompt: &str) -> GeneratedText {
        let Some(client) = &self.client else {
            warn!("No text generation API key configured");
            return GeneratedText::fallback(FALLBACK_CONTENT);
        };

        match self.request(client, prompt).await {
            Ok(text) => {
                info!(chars = text.chars().count(), "Text generation succeeded");
                GeneratedText::ai(text)
            }
            Err(e) => {
                warn!("Text generation API error: {}", e);
                GeneratedText::fallback(FALLBACK_CONTENT)
            }
        }
    }
}
