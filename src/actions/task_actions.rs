use super::{ActionContext, ActionModule};
use crate::core::{NewTask, TaskPatch};
use crate::errors::{Error, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

pub const CREATE_TASK: &str = "createTask";
pub const LIST_STEPS: &str = "listSteps";
pub const GET_STEP: &str = "getStep";
pub const SUBMIT: &str = "submit";
pub const CHANGE_STEP: &str = "changeStep";

const CREATE_TASK_SPEC: &str = "createTask<workflowName:string>(Start a task for the workflow matching the user's intent, by workflow name)->(the created task: id, status, workflow, currentStep)";
const LIST_STEPS_SPEC: &str =
    "listSteps<>(List the steps of the current workflow)->(array of {name, description})";
const GET_STEP_SPEC: &str = "getStep<name:string>(Get a step of the current workflow by its exact name)->(the step: id, name, description, instructions, submitWhen)";
const SUBMIT_SPEC: &str = "submit<status?:string,*>(Submit the data collected in the current step once its completion condition is met. Pass status \"failed\" when the step cannot be completed)->(the submitted data)";
const CHANGE_STEP_SPEC: &str = "changeStep<name:string>(Move the task to another step of the current workflow by its exact name)->({name, description, id})";

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::MissingArgument(key.to_string()))
}

/// Creates a task for a workflow of the ambient job or copilot
pub struct CreateTask {
    context: Arc<ActionContext>,
}

impl CreateTask {
    pub fn new(context: Arc<ActionContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl ActionModule for CreateTask {
    fn name(&self) -> &str {
        CREATE_TASK
    }

    fn spec(&self) -> &str {
        CREATE_TASK_SPEC
    }

    async fn call(&self, args: Value) -> Result<Value> {
        let workflow_name = required_str(&args, "workflowName")?;
        let mut scope = self.context.scope.lock().await;

        let workflow = self
            .context
            .workflows
            .find_workflow(scope.job.as_deref(), scope.copilot.as_deref(), workflow_name)
            .ok_or_else(|| Error::WorkflowNotFound(workflow_name.to_string()))?;

        let mut context = Map::new();
        context.insert("user".to_string(), scope.user.clone());

        let task = self
            .context
            .store
            .create(NewTask {
                ext_id: scope.ext_id.clone(),
                workflow: workflow.id.clone(),
                current_step: Some(workflow.first_step.clone()),
                context,
            })
            .await?;

        info!(
            "Created task {} for workflow '{}' on thread {}",
            task.id, workflow.name, scope.ext_id
        );

        let summary = task.summary();
        scope.current_step = workflow.step(&workflow.first_step).cloned();
        scope.workflow = Some(workflow);
        scope.task = Some(task);
        Ok(summary)
    }
}

/// Lists `{name, description}` of every step of the resolved workflow
pub struct ListSteps {
    context: Arc<ActionContext>,
}

impl ListSteps {
    pub fn new(context: Arc<ActionContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl ActionModule for ListSteps {
    fn name(&self) -> &str {
        LIST_STEPS
    }

    fn spec(&self) -> &str {
        LIST_STEPS_SPEC
    }

    async fn call(&self, _args: Value) -> Result<Value> {
        let scope = self.context.scope.lock().await;
        let workflow = scope.workflow.as_ref().ok_or(Error::NoActiveWorkflow)?;
        Ok(Value::Array(
            workflow
                .steps
                .iter()
                .map(|s| json!({ "name": s.name, "description": s.description }))
                .collect(),
        ))
    }
}

/// Exact-name step lookup in the resolved workflow
pub struct GetStep {
    context: Arc<ActionContext>,
}

impl GetStep {
    pub fn new(context: Arc<ActionContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl ActionModule for GetStep {
    fn name(&self) -> &str {
        GET_STEP
    }

    fn spec(&self) -> &str {
        GET_STEP_SPEC
    }

    async fn call(&self, args: Value) -> Result<Value> {
        let name = required_str(&args, "name")?;
        let scope = self.context.scope.lock().await;
        let workflow = scope.workflow.as_ref().ok_or(Error::NoActiveWorkflow)?;
        let step = workflow
            .step_by_name(name)
            .ok_or_else(|| Error::StepNotFound(name.to_string()))?;
        Ok(json!({
            "id": step.id,
            "name": step.name,
            "description": step.description,
            "instructions": step.instructions,
            "submitWhen": step.submit_when,
        }))
    }
}

/// Echoes its arguments; the orchestrator advances the task when it sees the call
pub struct Submit;

#[async_trait]
impl ActionModule for Submit {
    fn name(&self) -> &str {
        SUBMIT
    }

    fn spec(&self) -> &str {
        SUBMIT_SPEC
    }

    async fn call(&self, args: Value) -> Result<Value> {
        debug!("submit called with {}", args);
        Ok(args)
    }
}

/// Moves the task to a named step and persists the move immediately
pub struct ChangeStep {
    context: Arc<ActionContext>,
}

impl ChangeStep {
    pub fn new(context: Arc<ActionContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl ActionModule for ChangeStep {
    fn name(&self) -> &str {
        CHANGE_STEP
    }

    fn spec(&self) -> &str {
        CHANGE_STEP_SPEC
    }

    async fn call(&self, args: Value) -> Result<Value> {
        let name = required_str(&args, "name")?;
        let mut scope = self.context.scope.lock().await;
        let workflow = scope.workflow.as_ref().ok_or(Error::NoActiveWorkflow)?;
        let step = workflow
            .step_by_name(name)
            .ok_or_else(|| Error::StepNotFound(name.to_string()))?
            .clone();
        let task = scope.task.as_ref().ok_or(Error::NoActiveWorkflow)?;

        let mut patch = TaskPatch::default();
        patch.set_current_step(&step.id);
        let updated = self
            .context
            .store
            .update(&task.id, &task.updated_at, &patch)
            .await?;

        info!("Task {} moved to step '{}'", updated.id, step.name);
        let reply = json!({ "name": step.name, "description": step.description, "id": step.id });
        scope.task = Some(updated);
        scope.current_step = Some(step);
        Ok(reply)
    }
}
