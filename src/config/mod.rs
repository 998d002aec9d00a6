mod parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use parser::{load_engine_config, parse_engine_config};

use crate::constants::{
    DEFAULT_HISTORY_RETRIES, DEFAULT_HISTORY_RETRY_DELAY, DEFAULT_MAX_TOOL_ROUNDS, MAX_ITERATIONS,
};

/// Main configuration structure for an orchestration engine
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EngineConfig {
    /// Name of the assistant
    pub name: String,
    /// Optional description of the assistant
    #[serde(default)]
    pub description: Option<String>,
    /// Caller instructions prepended to every turn
    #[serde(default)]
    pub instructions: Option<String>,
    /// SQLite database path, overridden by `STEPWISE_DATABASE`
    #[serde(default)]
    pub database_path: Option<String>,
    /// Global parameters for the engine
    #[serde(default)]
    pub parameters: ParametersConfig,
    /// Shorthand output schema merged into the base agent response schema
    #[serde(default)]
    pub output_schema: Option<serde_json::Value>,
    /// Replace the base output schema instead of merging into it
    #[serde(default)]
    pub override_base_output_schema: bool,
    /// Jobs owning workflows and step actions
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
    /// Copilots owning additional workflows
    #[serde(default)]
    pub copilots: Vec<CopilotConfig>,
}

/// Global parameters for the engine
#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct ParametersConfig {
    /// Name/identifier of the LLM provider to use
    #[serde(default)]
    pub llm_provider: Option<String>,
    /// Name/identifier of the LLM model to use
    #[serde(default)]
    pub llm_model: Option<String>,
    /// Base URL override for OpenAI compatible endpoints
    #[serde(default)]
    pub api_base: Option<String>,
    /// Maximum number of recursive continuations per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Attempts when fetching thread history
    #[serde(default = "default_history_retries")]
    pub history_retries: usize,
    /// Delay between history attempts, humantime format ("250ms", "1s")
    #[serde(default = "default_history_retry_delay")]
    pub history_retry_delay: String,
    /// Tool-call rounds the function-calling agent may run per iteration
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    /// Job used when the caller does not name one
    #[serde(default)]
    pub default_job: Option<String>,
    /// Copilot used when the caller does not name one
    #[serde(default)]
    pub default_copilot: Option<String>,
    /// Model override per agent type
    #[serde(default)]
    pub agent_models: HashMap<String, String>,
}

impl Default for ParametersConfig {
    fn default() -> Self {
        Self {
            llm_provider: None,
            llm_model: None,
            api_base: None,
            max_iterations: default_max_iterations(),
            history_retries: default_history_retries(),
            history_retry_delay: default_history_retry_delay(),
            max_tool_rounds: default_max_tool_rounds(),
            default_job: None,
            default_copilot: None,
            agent_models: HashMap::new(),
        }
    }
}

impl ParametersConfig {
    /// Parsed history retry delay, falling back to the default on malformed input
    pub fn history_retry_delay(&self) -> std::time::Duration {
        humantime::parse_duration(&self.history_retry_delay).unwrap_or_else(|e| {
            tracing::warn!(
                "Invalid history_retry_delay '{}': {}, using {}",
                self.history_retry_delay,
                e,
                DEFAULT_HISTORY_RETRY_DELAY
            );
            std::time::Duration::from_millis(250)
        })
    }
}

fn default_max_iterations() -> usize {
    MAX_ITERATIONS
}

fn default_history_retries() -> usize {
    DEFAULT_HISTORY_RETRIES
}

fn default_history_retry_delay() -> String {
    DEFAULT_HISTORY_RETRY_DELAY.to_string()
}

fn default_max_tool_rounds() -> usize {
    DEFAULT_MAX_TOOL_ROUNDS
}

/// A job: owns workflows and the external actions their steps may use
#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct JobConfig {
    pub name: String,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
    #[serde(default)]
    pub workflows: Vec<WorkflowConfig>,
}

/// A copilot: owns workflows offered alongside the job's own
#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct CopilotConfig {
    pub name: String,
    #[serde(default)]
    pub workflows: Vec<WorkflowConfig>,
}

/// An external action bound to a job
#[derive(Debug, Deserialize, Clone, Serialize, PartialEq)]
pub struct ActionConfig {
    /// Capability identifier exposed to the agent
    pub name: String,
    /// Module reference: `native:<name>` or an `http(s)://` URL
    pub module: String,
    /// Capability spec string `name<args>(description)->(returns)`
    #[serde(default)]
    pub spec: Option<String>,
}

/// Configuration for a workflow
#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct WorkflowConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Name of the first step, defaults to the first listed step
    #[serde(default)]
    pub first_step: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// Represents a single step in a workflow
#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct StepConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instructions: String,
    /// Human readable completion condition
    #[serde(default)]
    pub submit_when: String,
    /// Name of the following step, absent for a terminal step
    #[serde(default)]
    pub next: Option<String>,
    /// Name of the step taken on failure
    #[serde(default)]
    pub failed_next: Option<String>,
    /// Job action names available only in this step
    #[serde(default)]
    pub actions: Vec<String>,
    /// Job overriding the ambient one for this step
    #[serde(default)]
    pub job: Option<String>,
}
