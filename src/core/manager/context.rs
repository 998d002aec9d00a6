use crate::actions::ActionRegistry;
use crate::agents::ReasoningDelegate;
use crate::config::EngineConfig;
use crate::constants::{DEFAULT_HISTORY_RETRIES, HISTORY_FUNCTION_NAME, MAX_ITERATIONS};
use crate::core::{HistoryProvider, HistoryQuery, TaskStore, WorkflowStore};
use crate::llm::{OutputValidator, SchemaValidator};
use crate::prompt::{PromptComposer, TemplateComposer};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Tunables of the orchestrator
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Continuations allowed after the first iteration of a turn
    pub max_iterations: usize,
    pub history_query: HistoryQuery,
    /// Job used when a turn does not name one
    pub default_job: Option<String>,
    pub default_copilot: Option<String>,
    /// Shorthand merged into the base output schema
    pub output_schema: Option<Value>,
    pub override_base_output_schema: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            history_query: HistoryQuery {
                function_name: HISTORY_FUNCTION_NAME.to_string(),
                max_retries: DEFAULT_HISTORY_RETRIES,
                retry_delay: Duration::from_millis(250),
            },
            default_job: None,
            default_copilot: None,
            output_schema: None,
            override_base_output_schema: false,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        let parameters = &config.parameters;
        Self {
            max_iterations: parameters.max_iterations,
            history_query: HistoryQuery {
                function_name: HISTORY_FUNCTION_NAME.to_string(),
                max_retries: parameters.history_retries,
                retry_delay: parameters.history_retry_delay(),
            },
            default_job: parameters.default_job.clone(),
            default_copilot: parameters.default_copilot.clone(),
            output_schema: config.output_schema.clone(),
            override_base_output_schema: config.override_base_output_schema,
        }
    }
}

/// Collaborators of the orchestrator, injected once and shared by every turn
#[derive(Clone)]
pub struct EngineContext {
    pub store: Arc<dyn TaskStore>,
    pub workflows: Arc<dyn WorkflowStore>,
    pub history: Arc<dyn HistoryProvider>,
    pub delegate: Arc<dyn ReasoningDelegate>,
    pub validator: Arc<dyn OutputValidator>,
    pub composer: Arc<dyn PromptComposer>,
    pub registry: Arc<ActionRegistry>,
    pub settings: EngineSettings,
}

impl EngineContext {
    /// Context with the default validator, composer, an empty registry and default settings
    pub fn new(
        store: Arc<dyn TaskStore>,
        workflows: Arc<dyn WorkflowStore>,
        history: Arc<dyn HistoryProvider>,
        delegate: Arc<dyn ReasoningDelegate>,
    ) -> Self {
        Self {
            store,
            workflows,
            history,
            delegate,
            validator: Arc::new(SchemaValidator),
            composer: Arc::new(TemplateComposer),
            registry: Arc::new(ActionRegistry::new()),
            settings: EngineSettings::default(),
        }
    }

    pub fn with_registry(mut self, registry: Arc<ActionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn OutputValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_composer(mut self, composer: Arc<dyn PromptComposer>) -> Self {
        self.composer = composer;
        self
    }
}
