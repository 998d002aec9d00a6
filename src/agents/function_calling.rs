use super::{response_body, AgentReply, AgentRequest, ReasoningDelegate};
use crate::errors::Result;
use crate::event::{emit, Event};
use crate::llm::{ChatMessage, LlmClient, Role};
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Delegate backed by an OpenAI compatible function-calling model
///
/// Tool calls requested by the model are executed against the action set of
/// the request and their results fed back, until the model answers without
/// calling a tool or `max_tool_rounds` is reached.
#[derive(Debug)]
pub struct FunctionCallingAgent {
    llm_client: LlmClient,
    max_tool_rounds: usize,
    /// Model override per agent type
    agent_models: HashMap<String, String>,
}

impl FunctionCallingAgent {
    pub fn new(llm_client: LlmClient, max_tool_rounds: usize) -> Self {
        Self {
            llm_client,
            max_tool_rounds: max_tool_rounds.max(1),
            agent_models: HashMap::new(),
        }
    }

    pub fn with_agent_models(mut self, agent_models: HashMap<String, String>) -> Self {
        self.agent_models = agent_models;
        self
    }

    fn model_for(&self, agent_type: Option<&str>) -> Option<&str> {
        agent_type
            .and_then(|t| self.agent_models.get(t))
            .map(String::as_str)
    }
}

#[async_trait]
impl ReasoningDelegate for FunctionCallingAgent {
    async fn run(&self, request: AgentRequest) -> Result<AgentReply> {
        let tools = request.actions.tool_definitions()?;
        let model = self.model_for(request.agent_type.as_deref());
        let stream = request.stream.as_ref();

        let mut messages = Vec::with_capacity(request.history.len() + 1);
        messages.push(ChatMessage::new(Role::System, &request.instructions));
        messages.extend(request.history.iter().cloned());

        let mut functions = Vec::new();
        for round in 1..=self.max_tool_rounds {
            let response = self.llm_client.chat(&messages, &tools, model).await?;

            if response.tool_calls.is_empty() {
                let content = response.content.unwrap_or_default();
                emit(stream, Event::Message(request.ext_id.clone(), content.clone()));
                return Ok(AgentReply {
                    prompt: request.instructions,
                    body: response_body(&content, functions),
                });
            }

            debug!("Tool round {}: {} calls", round, response.tool_calls.len());
            messages.push(ChatMessage::assistant_tool_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                let name = call.function.name.as_str();
                let args: Value = if call.function.arguments.trim().is_empty() {
                    json!({})
                } else {
                    serde_json::from_str(&call.function.arguments).unwrap_or_else(|e| {
                        warn!("Unparsable arguments for '{}': {}", name, e);
                        json!({})
                    })
                };

                let (results, status) = match request.actions.invoke(name, args.clone()).await {
                    Ok(results) => {
                        let status = match results.get("status").and_then(Value::as_str) {
                            Some("failed") => "failed",
                            _ => "completed",
                        };
                        (results, status)
                    }
                    Err(e) => {
                        warn!("Action '{}' failed: {}", name, e);
                        (json!({ "error": e.to_string() }), "failed")
                    }
                };

                info!(
                    "Action '{}' {} -> {}",
                    name,
                    status,
                    truncate_for_log(&results.to_string(), 200)
                );
                messages.push(ChatMessage::tool_result(&call.id, &results.to_string()));
                emit(
                    stream,
                    Event::FunctionInvoked(
                        request.ext_id.clone(),
                        name.to_string(),
                        status.to_string(),
                        results.clone(),
                    ),
                );
                functions.push(json!({
                    "name": name,
                    "args": args,
                    "results": results,
                    "status": status,
                }));
            }
        }

        warn!(
            "Tool round limit ({}) reached for {}",
            self.max_tool_rounds, request.ext_id
        );
        Ok(AgentReply {
            prompt: request.instructions,
            body: response_body("", functions),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionContext, ActionModuleSet, TaskScope};
    use crate::core::WorkflowCatalog;
    use crate::db::MemoryTaskStore;
    use crate::llm::providers::LlmProvider;
    use crate::llm::{ChatResponse, ToolCall, ToolCallFunction, ToolDefinition};
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct Scripted {
        replies: Mutex<Vec<ChatResponse>>,
        seen_models: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for Scripted {
        async fn chat(
            &self,
            model: &str,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
        ) -> Result<ChatResponse> {
            self.seen_models.lock().unwrap().push(model.to_string());
            let mut replies = self.replies.lock().unwrap();
            Ok(if replies.is_empty() {
                ChatResponse::default()
            } else {
                replies.remove(0)
            })
        }
    }

    fn tool_call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: format!("call_{}", name),
            call_type: "function".into(),
            function: ToolCallFunction {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    fn request(agent_type: Option<&str>) -> AgentRequest {
        let context = ActionContext::new(
            Arc::new(MemoryTaskStore::default()),
            Arc::new(WorkflowCatalog::default()),
            TaskScope::default(),
        );
        AgentRequest {
            actions: ActionModuleSet::new(context),
            instructions: "be brief".into(),
            history: vec![ChatMessage::user("hello")],
            user: Value::Null,
            ext_id: "thread-1".into(),
            options: Value::Null,
            agent_type: agent_type.map(String::from),
            stream: None,
        }
    }

    fn agent(replies: Vec<ChatResponse>, rounds: usize) -> (FunctionCallingAgent, Arc<Scripted>) {
        let provider = Arc::new(Scripted {
            replies: Mutex::new(replies),
            seen_models: Mutex::new(Vec::new()),
        });
        #[derive(Debug)]
        struct Shared(Arc<Scripted>);
        #[async_trait]
        impl LlmProvider for Shared {
            async fn chat(
                &self,
                model: &str,
                messages: &[ChatMessage],
                tools: &[ToolDefinition],
            ) -> Result<ChatResponse> {
                self.0.chat(model, messages, tools).await
            }
        }
        let client = LlmClient::with_provider(Box::new(Shared(provider.clone())), "default-model");
        (FunctionCallingAgent::new(client, rounds), provider)
    }

    #[tokio::test]
    async fn records_tool_calls_and_their_status() {
        let (agent, _) = agent(
            vec![
                ChatResponse {
                    content: None,
                    tool_calls: vec![
                        tool_call("submit", r#"{"status":"failed","reason":"no id"}"#),
                        tool_call("getStep", r#"{"name":"x"}"#),
                    ],
                },
                ChatResponse {
                    content: Some("Sorry, that did not work".into()),
                    tool_calls: vec![],
                },
            ],
            4,
        );

        let reply = agent.run(request(None)).await.unwrap();
        assert_eq!(reply.prompt, "be brief");
        assert_eq!(reply.body["message"], "Sorry, that did not work");
        let functions = reply.body["functions"].as_array().unwrap();
        assert_eq!(functions.len(), 2);
        assert_eq!(functions[0]["status"], "failed");
        assert_eq!(functions[0]["results"]["reason"], "no id");
        // no workflow is resolved, so getStep raises
        assert_eq!(functions[1]["status"], "failed");
        assert!(functions[1]["results"]["error"].is_string());
    }

    #[tokio::test]
    async fn stops_at_round_limit() {
        let (agent, provider) = agent(
            vec![
                ChatResponse {
                    content: None,
                    tool_calls: vec![tool_call("submit", "{}")],
                },
                ChatResponse {
                    content: None,
                    tool_calls: vec![tool_call("submit", "")],
                },
            ],
            1,
        );
        let reply = agent.run(request(None)).await.unwrap();
        assert_eq!(reply.body["message"], "");
        assert_eq!(reply.body["functions"].as_array().unwrap().len(), 1);
        assert_eq!(provider.seen_models.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn agent_type_selects_model() {
        let (agent, provider) = agent(vec![], 2);
        let agent = agent.with_agent_models(HashMap::from([(
            "support".to_string(),
            "support-model".to_string(),
        )]));
        agent.run(request(Some("support"))).await.unwrap();
        agent.run(request(Some("other"))).await.unwrap();
        assert_eq!(
            *provider.seen_models.lock().unwrap(),
            vec!["support-model".to_string(), "default-model".to_string()]
        );
    }
}
