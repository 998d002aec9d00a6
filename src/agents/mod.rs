//! Reasoning delegates: the agents deciding which actions to run for a turn.

mod function_calling;

pub use function_calling::*;

use crate::actions::ActionModuleSet;
use crate::errors::Result;
use crate::event::EventSink;
use crate::llm::ChatMessage;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

/// Everything a delegate receives for one iteration
#[derive(Debug, Clone)]
pub struct AgentRequest {
    /// Capabilities the delegate may call
    pub actions: ActionModuleSet,
    /// System instructions, prompt prefix included
    pub instructions: String,
    /// Conversation so far, ending with the user input of the turn when there is one
    pub history: Vec<ChatMessage>,
    pub user: Value,
    /// External conversation identifier
    pub ext_id: String,
    /// Caller options forwarded untouched
    pub options: Value,
    /// Selects a model override
    pub agent_type: Option<String>,
    pub stream: Option<EventSink>,
}

/// Raw delegate output; `body` is untrusted until validated
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub prompt: String,
    pub body: Value,
}

#[async_trait]
pub trait ReasoningDelegate: Send + Sync {
    async fn run(&self, request: AgentRequest) -> Result<AgentReply>;
}

/// One function invocation reported by the delegate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionCall {
    pub name: String,
    pub args: Value,
    pub results: Value,
    pub status: Option<String>,
}

impl FunctionCall {
    pub fn failed(&self) -> bool {
        self.status.as_deref() == Some("failed")
    }
}

/// Typed view of an agent response body
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AgentResponse {
    pub message: String,
    pub functions: Vec<FunctionCall>,
}

impl AgentResponse {
    /// Reads a body leniently: malformed entries are skipped, missing fields default
    ///
    /// Invalid bodies still flow through the turn, so this never fails.
    pub fn from_body(body: &Value) -> Self {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let functions = body
            .get("functions")
            .and_then(Value::as_array)
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|call| {
                        let name = call.get("name")?.as_str()?;
                        Some(FunctionCall {
                            name: name.to_string(),
                            args: call.get("args").cloned().unwrap_or(Value::Null),
                            results: call.get("results").cloned().unwrap_or(Value::Null),
                            status: call.get("status").and_then(Value::as_str).map(String::from),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        AgentResponse { message, functions }
    }
}

/// Final body of a tool loop: a JSON object answer keeps its own fields
pub(crate) fn response_body(content: &str, functions: Vec<Value>) -> Value {
    let mut body = match serde_json::from_str::<Value>(content.trim()) {
        Ok(Value::Object(fields)) if fields.contains_key("message") => fields,
        _ => {
            let mut fields = Map::new();
            fields.insert("message".to_string(), Value::String(content.to_string()));
            fields
        }
    };
    if !functions.is_empty() || !body.contains_key("functions") {
        body.insert("functions".to_string(), Value::Array(functions));
    }
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_body_leniently() {
        let response = AgentResponse::from_body(&json!({
            "message": "ok",
            "functions": [
                {"name": "submit", "args": {"status": "failed"}, "status": "failed"},
                {"args": {}},
                {"name": "listSteps"}
            ]
        }));
        assert_eq!(response.message, "ok");
        assert_eq!(response.functions.len(), 2);
        assert!(response.functions[0].failed());
        assert_eq!(response.functions[1].status, None);
    }

    #[test]
    fn non_object_body_is_empty() {
        assert_eq!(AgentResponse::from_body(&json!("text")), AgentResponse::default());
    }

    #[test]
    fn structured_answer_is_kept() {
        let body = response_body(r#"{"message": "hi", "mood": "calm"}"#, vec![]);
        assert_eq!(body["mood"], "calm");
        assert_eq!(body["functions"], json!([]));

        let body = response_body("plain", vec![json!({"name": "getStep"})]);
        assert_eq!(body["message"], "plain");
        assert_eq!(body["functions"][0]["name"], "getStep");
    }
}
