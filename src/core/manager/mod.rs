mod context;
mod message;
mod run;
mod transitions;

pub use context::{EngineContext, EngineSettings};
pub use transitions::{interpret, PendingUpdate};

use crate::actions::{ActionContext, ActionModuleSet};
use crate::agents::{AgentResponse, FunctionCall};
use crate::constants::{CONSUMPTION_STEPS, DEFAULT_INSTRUCTIONS};
use crate::core::Resolution;
use crate::event::EventSink;
use crate::llm::ChatMessage;
use crate::prompt::{step_prompt_vars, workflow_selection_vars};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

/// Caller selections scoping a turn
#[derive(Debug, Clone, Default)]
pub struct TurnOptions {
    /// Job owning the workflows on offer, defaults to the configured one
    pub job: Option<String>,
    pub copilot: Option<String>,
    /// Forwarded to the delegate untouched
    pub extra: Value,
}

/// One inbound conversational turn
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    /// Caller instructions, the task prompt is prepended to them
    pub instructions: String,
    pub input: Option<String>,
    pub user: Value,
    /// External conversation identifier
    pub ext_id: String,
    /// History supplied by the caller; fetched from the history provider when absent
    pub thread_logs: Option<Vec<ChatMessage>>,
    pub options: TurnOptions,
    /// Shorthand output schema for this turn, replaces the configured one
    pub output_schema: Option<Value>,
    pub override_base_output_schema: Option<bool>,
    pub agent_type: Option<String>,
    pub stream: Option<EventSink>,
}

impl TurnRequest {
    pub fn new(ext_id: &str, input: &str) -> Self {
        Self {
            ext_id: ext_id.to_string(),
            input: Some(input.to_string()),
            ..Default::default()
        }
    }
}

/// Amount of work a turn took
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Consumption {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: usize,
}

impl Consumption {
    pub fn steps(value: usize) -> Self {
        Self {
            kind: CONSUMPTION_STEPS.to_string(),
            value,
        }
    }
}

/// Outcome of a turn: the prompt used, the response fields and the consumption
#[derive(Debug, Clone, Serialize)]
pub struct TurnResponse {
    pub prompt: String,
    /// `message`, `functions`, `error` and any field the output schema adds
    #[serde(flatten)]
    pub body: Map<String, Value>,
    pub consumption: Consumption,
}

impl TurnResponse {
    pub fn message(&self) -> &str {
        self.body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn functions(&self) -> Vec<FunctionCall> {
        AgentResponse::from_body(&Value::Object(self.body.clone())).functions
    }

    /// Code of the attached error, e.g. `INVALID_RESPONSE`
    pub fn error_code(&self) -> Option<&str> {
        self.body.get("error")?.get("code")?.as_str()
    }

    /// Response fields as recorded in the conversation history
    pub fn body_value(&self) -> Value {
        Value::Object(self.body.clone())
    }
}

/// Orchestrator of conversational tasks
///
/// Each turn resolves the active task of the conversation, asks the delegate
/// to act on it, validates what comes back and commits the resulting
/// transition, continuing on its own while the delegate keeps changing the
/// task state.
#[derive(Clone)]
pub struct TaskManager {
    ctx: EngineContext,
}

impl TaskManager {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// Task prompt prefix followed by the caller instructions
    fn compose_instructions(
        &self,
        instructions: &str,
        resolution: &Resolution,
        job: Option<&str>,
        copilot: Option<&str>,
    ) -> String {
        let (template, vars) = match (&resolution.task, &resolution.workflow, &resolution.step) {
            (Some(task), Some(workflow), Some(step)) => step_prompt_vars(workflow, step, task),
            _ => {
                let workflows = self.ctx.workflows.workflows_for(job, copilot);
                workflow_selection_vars(&workflows)
            }
        };
        let prefix = self.ctx.composer.compose(template, &vars);
        let instructions = if instructions.trim().is_empty() {
            DEFAULT_INSTRUCTIONS
        } else {
            instructions
        };
        format!("{}{}", prefix, instructions)
    }

    /// The five task actions plus the actions bound to the current step
    fn action_set(&self, context: Arc<ActionContext>, resolution: &Resolution) -> ActionModuleSet {
        let mut actions = ActionModuleSet::new(context);
        let Some(step) = &resolution.step else {
            return actions;
        };
        for name in &step.actions {
            let module = resolution
                .job
                .as_ref()
                .and_then(|job| self.ctx.registry.resolve(&job.name, name));
            match module {
                Some(module) => actions = actions.with_module(module),
                None => warn!("Action '{}' of step '{}' is not registered", name, step.name),
            }
        }
        actions
    }
}
