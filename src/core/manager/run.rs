use super::transitions::{interpret, PendingUpdate};
use super::{Consumption, TaskManager, TurnRequest, TurnResponse};
use crate::actions::{ActionContext, TaskScope};
use crate::agents::{AgentRequest, AgentResponse};
use crate::core::{TaskResolver, ThreadLog};
use crate::errors::Result;
use crate::event::{emit, EventSink};
use crate::llm::{output_schema, ChatMessage};
use crate::utils::now_rfc3339;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info};

impl TaskManager {
    /// Runs one conversational turn
    ///
    /// The delegate is invoked once, then again (with no new input) each time
    /// its response changed the task through one of the offered actions, up
    /// to `max_iterations` continuations.
    ///
    /// # Errors
    /// Only store reads, catalog inconsistencies and delegate failures are
    /// raised. Invalid responses are annotated and persistence failures logged.
    pub async fn handle_turn(&self, request: TurnRequest) -> Result<TurnResponse> {
        let settings = &self.ctx.settings;
        let job = request.options.job.clone().or_else(|| settings.default_job.clone());
        let copilot = request
            .options
            .copilot
            .clone()
            .or_else(|| settings.default_copilot.clone());
        let schema = output_schema(
            request.output_schema.as_ref().or(settings.output_schema.as_ref()),
            request
                .override_base_output_schema
                .unwrap_or(settings.override_base_output_schema),
        );

        let action_context = ActionContext::new(
            self.ctx.store.clone(),
            self.ctx.workflows.clone(),
            TaskScope {
                ext_id: request.ext_id.clone(),
                user: request.user.clone(),
                job: job.clone(),
                copilot: copilot.clone(),
                ..Default::default()
            },
        );
        let resolver = TaskResolver::new(self.ctx.store.as_ref(), self.ctx.workflows.as_ref());

        let mut iterations = 0;
        let mut thread_logs = request.thread_logs.clone();
        let mut input = request.input.clone();

        loop {
            let resolution = resolver.resolve(&request.ext_id, job.as_deref()).await?;
            {
                let mut scope = action_context.scope.lock().await;
                scope.task = resolution.task.clone();
                scope.workflow = resolution.workflow.clone();
                scope.current_step = resolution.step.clone();
            }

            let mut history = match thread_logs.take() {
                Some(logs) => logs,
                None => self.rebuild_history(&request.ext_id, &schema).await,
            };

            let prompt = self.compose_instructions(
                &request.instructions,
                &resolution,
                job.as_deref(),
                copilot.as_deref(),
            );
            if let Some(text) = input.take().filter(|t| !t.trim().is_empty()) {
                history.push(ChatMessage::user(&text));
            }

            let actions = self.action_set(action_context.clone(), &resolution);
            debug!(
                "Iteration {} for {} with actions {:?}",
                iterations,
                request.ext_id,
                actions.names()
            );
            let reply = self
                .ctx
                .delegate
                .run(AgentRequest {
                    actions: actions.clone(),
                    instructions: prompt,
                    history: history.clone(),
                    user: request.user.clone(),
                    ext_id: request.ext_id.clone(),
                    options: request.options.extra.clone(),
                    agent_type: request.agent_type.clone(),
                    stream: request.stream.clone(),
                })
                .await?;

            let (body, valid) = self.validate_response(reply.body, &schema);
            let response = AgentResponse::from_body(&body);

            // Only a validated response may move the task
            let scope = action_context.snapshot().await;
            let pending = if valid {
                interpret(
                    &response.functions,
                    resolution.step.as_ref(),
                    &scope,
                    &now_rfc3339(),
                )
            } else {
                PendingUpdate::default()
            };
            let changed = !pending.is_empty();
            let terminal = changed
                && self
                    .persist(&action_context, &scope, pending, request.stream.as_ref())
                    .await;

            let offered = response.functions.iter().any(|f| actions.contains(&f.name));
            if changed && offered && !terminal && iterations < settings.max_iterations {
                info!(
                    "Continuing turn for {} (iteration {})",
                    request.ext_id,
                    iterations + 1
                );
                history.push(ChatMessage::assistant(&body.to_string()));
                thread_logs = Some(history);
                iterations += 1;
                continue;
            }

            let body = match body {
                Value::Object(fields) => fields,
                _ => Map::new(),
            };
            let turn = TurnResponse {
                prompt: reply.prompt,
                body,
                consumption: Consumption::steps(iterations + 1),
            };
            self.record_turn(&request, &turn).await;
            return Ok(turn);
        }
    }

    /// Stores the pending update against the bound task
    ///
    /// Returns whether the task is now terminal. Failures are logged only: a
    /// storage hiccup must not fail the turn.
    async fn persist(
        &self,
        action_context: &Arc<ActionContext>,
        scope: &TaskScope,
        pending: PendingUpdate,
        stream: Option<&EventSink>,
    ) -> bool {
        let Some(task) = &scope.task else {
            return false;
        };
        match self
            .ctx
            .store
            .update(&task.id, &task.updated_at, &pending.patch)
            .await
        {
            Ok(updated) => {
                info!(
                    "Task {} is {} at step {:?}",
                    updated.id, updated.status, updated.current_step
                );
                let terminal = updated.status.is_terminal();
                action_context.scope.lock().await.task = Some(updated);
                for event in pending.events {
                    emit(stream, event);
                }
                terminal
            }
            Err(e) => {
                error!("Failed to persist update of task {}: {}", task.id, e);
                false
            }
        }
    }

    async fn record_turn(&self, request: &TurnRequest, turn: &TurnResponse) {
        let log = ThreadLog {
            input: request.input.clone(),
            response: turn.body_value(),
            created_at: now_rfc3339(),
        };
        if let Err(e) = self.ctx.history.record_turn(&request.ext_id, log).await {
            error!("Failed to record turn for {}: {}", request.ext_id, e);
        }
    }
}
