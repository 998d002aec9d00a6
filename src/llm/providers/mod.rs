use crate::errors::Result;
use crate::llm::{ChatMessage, ChatResponse, ToolDefinition};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openai;

#[async_trait]
pub trait LlmProvider: Debug + Send + Sync {
    /// Runs one chat completion, advertising `tools` when non-empty
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse>;
}
