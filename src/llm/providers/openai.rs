use super::LlmProvider;
use crate::errors::{Error, Result};
use crate::llm::{ChatMessage, ChatResponse, ToolCall, ToolDefinition};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEEPSEEK_API_BASE: &str = "https://api.deepseek.com/v1";
const OLLAMA_API_BASE: &str = "http://localhost:11434/v1";

/// Provider for OpenAI compatible chat-completions endpoints
///
/// Covers OpenAI itself, DeepSeek and Ollama, which only differ by base URL
/// and credentials.
#[derive(Debug)]
pub struct OpenAiProvider {
    client: Client,
    /// Bearer token, absent for local endpoints
    api_key: Option<String>,
    /// Base URL without the trailing `/chat/completions`
    api_base: String,
}

impl OpenAiProvider {
    /// Creates a provider for a named backend
    ///
    /// # Arguments
    /// * `provider_name` - "openai", "deepseek" or "ollama"
    /// * `api_base` - Optional base URL override
    ///
    /// # Errors
    /// * `Error::Config` - unknown provider or missing API key
    pub fn for_provider(provider_name: &str, api_base: Option<&str>) -> Result<Self> {
        let (default_base, key_var) = match provider_name {
            "openai" => (OPENAI_API_BASE, Some("OPENAI_API_KEY")),
            "deepseek" => (DEEPSEEK_API_BASE, Some("DEEPSEEK_API_KEY")),
            "ollama" => (OLLAMA_API_BASE, None),
            _ => {
                return Err(Error::Config(format!(
                    "Unknown provider '{}'",
                    provider_name
                )))
            }
        };

        let api_key = match key_var {
            Some(var) => Some(std::env::var(var).map_err(|_| {
                Error::Config(format!("{} environment variable not set", var))
            })?),
            None => None,
        };

        Ok(OpenAiProvider {
            client: Client::new(),
            api_key,
            api_base: api_base
                .unwrap_or(default_base)
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDefinition],
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a str>,
    temperature: f32,
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse> {
        let request_body = CompletionRequest {
            model,
            messages,
            tools,
            tool_choice: (!tools.is_empty()).then_some("auto"),
            temperature: 0.2,
        };

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .json(&request_body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!("Sending {} messages to {} ({})", messages.len(), self.api_base, model);
        let res = request.send().await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await?;
            return Err(Error::Delegate(format!(
                "chat completion failed with {}: {}",
                status, text
            )));
        }

        let parsed: CompletionResponse = res.json().await?;
        let message = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Delegate("No choices in chat completion response".to_string()))?
            .message;

        Ok(ChatResponse {
            content: message.content.map(|c| c.trim().to_string()),
            tool_calls: message.tool_calls.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ollama_needs_no_key() {
        let provider = OpenAiProvider::for_provider("ollama", Some("http://gpu:11434/v1/")).unwrap();
        assert_eq!(provider.api_base, "http://gpu:11434/v1");
        assert!(provider.api_key.is_none());
    }

    #[test]
    fn unknown_provider_is_a_config_error() {
        assert!(matches!(
            OpenAiProvider::for_provider("palm", None),
            Err(Error::Config(_))
        ));
    }
}
