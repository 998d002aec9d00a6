use crate::errors::Result;
use crate::llm::providers::openai::OpenAiProvider;
use crate::llm::providers::LlmProvider;
use crate::llm::{ChatMessage, ChatResponse, ToolDefinition};
use tracing::debug;

/// Generic LLM client that delegates work to a concrete provider.
#[derive(Debug)]
pub struct LlmClient {
    provider: Box<dyn LlmProvider>,
    /// Model used when the caller does not override it
    model: String,
}

impl LlmClient {
    /// Creates a new LLM client with the specified provider and model.
    ///
    /// # Arguments
    /// * `provider_name` - Name of the LLM provider ("openai", "deepseek" or "ollama")
    /// * `model` - Default model name
    /// * `api_base` - Optional base URL override
    pub fn new(provider_name: &str, model: &str, api_base: Option<&str>) -> Result<Self> {
        let provider = OpenAiProvider::for_provider(provider_name, api_base)?;
        Ok(Self::with_provider(Box::new(provider), model))
    }

    /// Wraps an already built provider
    pub fn with_provider(provider: Box<dyn LlmProvider>, model: &str) -> Self {
        LlmClient {
            provider,
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Runs a completion with the default model or `model_override`
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        model_override: Option<&str>,
    ) -> Result<ChatResponse> {
        let model = model_override.unwrap_or(&self.model);
        let response = self.provider.chat(model, messages, tools).await?;
        debug!(
            "LLM response: {} tool calls, content: {:?}",
            response.tool_calls.len(),
            response.content
        );
        Ok(response)
    }
}
