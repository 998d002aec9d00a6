//! Action modules: named capabilities exposed to the reasoning delegate.
//!
//! Each module advertises a spec string `name<args>(description)->(returns)`.
//! The delegate reads the specs to decide which functions to call; the
//! orchestrator interprets the calls it reports afterwards.

mod http_action;
mod native;
mod registry;
mod spec;
mod task_actions;

pub use http_action::HttpAction;
pub use native::{ClockAction, EchoAction, NativeAction};
pub use registry::{ActionRegistry, ModuleRef};
pub use spec::{ActionArg, ActionSpec};
pub use task_actions::*;

use crate::core::{Step, Task, TaskStore, Workflow, WorkflowStore};
use crate::errors::{Error, Result};
use crate::llm::ToolDefinition;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

#[async_trait]
pub trait ActionModule: Send + Sync {
    fn name(&self) -> &str;

    /// Capability spec string read by the delegate
    fn spec(&self) -> &str;

    async fn call(&self, args: Value) -> Result<Value>;
}

/// Task bindings shared by the action modules for one top-level call
#[derive(Debug, Clone, Default)]
pub struct TaskScope {
    /// External conversation identifier
    pub ext_id: String,
    pub user: Value,
    /// Ambient job
    pub job: Option<String>,
    pub copilot: Option<String>,
    pub task: Option<Task>,
    pub workflow: Option<Workflow>,
    pub current_step: Option<Step>,
}

/// Collaborators and shared bindings the task actions operate on
pub struct ActionContext {
    pub store: Arc<dyn TaskStore>,
    pub workflows: Arc<dyn WorkflowStore>,
    pub scope: Mutex<TaskScope>,
}

impl ActionContext {
    pub fn new(
        store: Arc<dyn TaskStore>,
        workflows: Arc<dyn WorkflowStore>,
        scope: TaskScope,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            workflows,
            scope: Mutex::new(scope),
        })
    }

    /// Copy of the current bindings
    pub async fn snapshot(&self) -> TaskScope {
        self.scope.lock().await.clone()
    }
}

/// The capability table handed to the delegate for one iteration
#[derive(Clone)]
pub struct ActionModuleSet {
    modules: Vec<Arc<dyn ActionModule>>,
}

impl ActionModuleSet {
    /// Builds the five task actions bound to `context`
    pub fn new(context: Arc<ActionContext>) -> Self {
        let modules: Vec<Arc<dyn ActionModule>> = vec![
            Arc::new(CreateTask::new(context.clone())),
            Arc::new(ListSteps::new(context.clone())),
            Arc::new(GetStep::new(context.clone())),
            Arc::new(Submit),
            Arc::new(ChangeStep::new(context)),
        ];
        Self { modules }
    }

    /// Adds a step-scoped action; a name already present is replaced
    pub fn with_module(mut self, module: Arc<dyn ActionModule>) -> Self {
        self.modules.retain(|m| m.name() != module.name());
        self.modules.push(module);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    /// Tool definitions derived from the capability strings
    pub fn tool_definitions(&self) -> Result<Vec<ToolDefinition>> {
        self.modules
            .iter()
            .map(|m| ActionSpec::parse(m.spec()).map(|s| s.to_tool_definition()))
            .collect()
    }

    /// Runs the named action
    ///
    /// # Errors
    /// * `Error::Config` - no module has this name
    /// * whatever the action raises
    pub async fn invoke(&self, name: &str, args: Value) -> Result<Value> {
        let module = self
            .modules
            .iter()
            .find(|m| m.name() == name)
            .ok_or_else(|| {
                Error::Config(format!(
                    "unknown action '{}', available: {}",
                    name,
                    self.names().join(", ")
                ))
            })?;
        module.call(args).await
    }
}

impl std::fmt::Debug for ActionModuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionModuleSet")
            .field("modules", &self.names())
            .finish()
    }
}
