//! Task transitions derived from the functions a delegate reports.
//!
//! | function   | status      | effect                                               |
//! |------------|-------------|------------------------------------------------------|
//! | submit     | not failed  | record the submission, move to `next` or complete    |
//! | submit     | failed      | fail the task, move to `failed_next` when declared   |
//! | createTask | not failed  | stamp `context.createdAt`, point at the first step   |
//! | changeStep | not failed  | point at the target step                             |

use crate::actions::{TaskScope, CHANGE_STEP, CREATE_TASK, SUBMIT};
use crate::agents::FunctionCall;
use crate::core::{Step, TaskPatch, TaskStatus};
use crate::event::Event;
use serde_json::Value;
use tracing::{debug, warn};

/// Update to persist once the response has been interpreted
#[derive(Debug, Default, Clone)]
pub struct PendingUpdate {
    pub patch: TaskPatch,
    /// Emitted after the patch is stored
    pub events: Vec<Event>,
}

impl PendingUpdate {
    pub fn is_empty(&self) -> bool {
        self.patch.is_empty()
    }
}

/// Builds the pending update for `functions`, in call order
///
/// `initial_step` is the step the iteration started at; `scope` holds the
/// bindings as left by the actions the delegate ran.
pub fn interpret(
    functions: &[FunctionCall],
    initial_step: Option<&Step>,
    scope: &TaskScope,
    now: &str,
) -> PendingUpdate {
    let mut pending = PendingUpdate::default();
    let (Some(task), Some(workflow)) = (&scope.task, &scope.workflow) else {
        if !functions.is_empty() {
            debug!("No task bound for {}, nothing to transition", scope.ext_id);
        }
        return pending;
    };

    let mut step = initial_step.cloned();
    for call in functions {
        match call.name.as_str() {
            CREATE_TASK if !call.failed() => {
                pending.patch.set("context.createdAt", Value::String(now.to_string()));
                pending.patch.set_current_step(&workflow.first_step);
                step = workflow.step(&workflow.first_step).cloned();
                pending
                    .events
                    .push(Event::TaskCreated(scope.ext_id.clone(), task.clone()));
            }
            CHANGE_STEP if !call.failed() => {
                let target = call
                    .results
                    .get("id")
                    .and_then(Value::as_str)
                    .and_then(|id| workflow.step(id))
                    .or_else(|| {
                        call.args
                            .get("name")
                            .and_then(Value::as_str)
                            .and_then(|name| workflow.step_by_name(name))
                    });
                match target {
                    Some(target) => {
                        pending.patch.set_current_step(&target.id);
                        pending.events.push(Event::StepChanged(
                            scope.ext_id.clone(),
                            task.id.clone(),
                            target.id.clone(),
                        ));
                        step = Some(target.clone());
                    }
                    None => warn!("changeStep reported an unknown target: {}", call.args),
                }
            }
            SUBMIT => {
                let Some(current) = step.clone() else {
                    warn!("submit reported while no step is loaded, ignored");
                    continue;
                };

                if call.failed() {
                    pending.patch.set_status(TaskStatus::Failed);
                    if let Some(failed_next) = &current.failed_next {
                        pending.patch.set_current_step(failed_next);
                    }
                    pending.events.push(Event::TaskFailed(
                        scope.ext_id.clone(),
                        task.id.clone(),
                        current.failed_next.clone(),
                    ));
                    break;
                }

                let index = workflow.step_index(&current.id).unwrap_or_default();
                let prefix = format!("context.steps.{}", index);
                pending
                    .patch
                    .set(format!("{}.submitParams", prefix), call.args.clone());
                pending
                    .patch
                    .set(format!("{}.submitResponse", prefix), call.results.clone());
                pending
                    .patch
                    .set(format!("{}.updatedAt", prefix), Value::String(now.to_string()));

                match &current.next {
                    Some(next) => {
                        pending.patch.set_current_step(next);
                        pending.events.push(Event::StepChanged(
                            scope.ext_id.clone(),
                            task.id.clone(),
                            next.clone(),
                        ));
                        step = workflow.step(next).cloned();
                    }
                    None => {
                        pending.patch.set_status(TaskStatus::Completed);
                        pending
                            .events
                            .push(Event::TaskCompleted(scope.ext_id.clone(), task.id.clone()));
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{NewTask, Task, Workflow};
    use serde_json::{json, Map};

    fn step(id: &str, next: Option<&str>, failed_next: Option<&str>) -> Step {
        Step {
            id: id.into(),
            name: id.into(),
            description: String::new(),
            instructions: String::new(),
            submit_when: String::new(),
            next: next.map(String::from),
            failed_next: failed_next.map(String::from),
            actions: vec![],
            job: None,
        }
    }

    fn scope() -> TaskScope {
        let workflow = Workflow {
            id: "w".into(),
            name: "W".into(),
            description: String::new(),
            first_step: "a".into(),
            steps: vec![
                step("a", Some("b"), Some("z")),
                step("b", None, None),
                step("z", None, None),
            ],
        };
        let task = Task::from_new(
            "t1".into(),
            NewTask {
                ext_id: "thread".into(),
                workflow: "w".into(),
                current_step: Some("a".into()),
                context: Map::new(),
            },
            "2026-01-01T00:00:00.000000Z".into(),
        );
        TaskScope {
            ext_id: "thread".into(),
            task: Some(task),
            workflow: Some(workflow),
            ..Default::default()
        }
    }

    fn call(name: &str, args: Value, status: Option<&str>) -> FunctionCall {
        FunctionCall {
            name: name.into(),
            args: args.clone(),
            results: args,
            status: status.map(String::from),
        }
    }

    #[test]
    fn submit_advances_to_next() {
        let scope = scope();
        let first = scope.workflow.as_ref().unwrap().steps[0].clone();
        let pending = interpret(
            &[call("submit", json!({"email": "a@b.c"}), Some("completed"))],
            Some(&first),
            &scope,
            "now",
        );
        assert_eq!(pending.patch.get("currentStep"), Some(&json!("b")));
        assert_eq!(
            pending.patch.get("context.steps.0.submitParams"),
            Some(&json!({"email": "a@b.c"}))
        );
        assert!(pending.patch.get("status").is_none());
    }

    #[test]
    fn submit_on_terminal_step_completes() {
        let scope = scope();
        let last = scope.workflow.as_ref().unwrap().steps[1].clone();
        let pending = interpret(&[call("submit", json!({}), None)], Some(&last), &scope, "now");
        assert_eq!(pending.patch.get("status"), Some(&json!("completed")));
        assert_eq!(pending.patch.get("context.steps.1.updatedAt"), Some(&json!("now")));
        assert!(matches!(pending.events[0], Event::TaskCompleted(..)));
    }

    #[test]
    fn failed_submit_fails_task() {
        let scope = scope();
        let workflow = scope.workflow.clone().unwrap();
        let pending = interpret(
            &[call("submit", json!({"status": "failed"}), Some("failed"))],
            Some(&workflow.steps[0]),
            &scope,
            "now",
        );
        assert_eq!(pending.patch.get("status"), Some(&json!("failed")));
        assert_eq!(pending.patch.get("currentStep"), Some(&json!("z")));

        let pending = interpret(
            &[call("submit", json!({}), Some("failed"))],
            Some(&workflow.steps[1]),
            &scope,
            "now",
        );
        assert_eq!(pending.patch.get("status"), Some(&json!("failed")));
        assert!(pending.patch.get("currentStep").is_none());
    }

    #[test]
    fn create_and_change_step() {
        let scope = scope();
        let pending = interpret(
            &[
                call("createTask", json!({"workflowName": "W"}), Some("completed")),
                call("changeStep", json!({"name": "b"}), None),
            ],
            None,
            &scope,
            "now",
        );
        assert_eq!(pending.patch.get("context.createdAt"), Some(&json!("now")));
        assert_eq!(pending.patch.get("currentStep"), Some(&json!("b")));
        assert_eq!(pending.events.len(), 2);
    }

    #[test]
    fn failed_and_read_only_calls_do_nothing() {
        let scope = scope();
        let pending = interpret(
            &[
                call("createTask", json!({}), Some("failed")),
                call("listSteps", json!({}), None),
                call("getStep", json!({"name": "a"}), None),
            ],
            None,
            &scope,
            "now",
        );
        assert!(pending.is_empty());
    }

    #[test]
    fn nothing_happens_without_a_task() {
        let pending = interpret(
            &[call("submit", json!({}), None)],
            None,
            &TaskScope::default(),
            "now",
        );
        assert!(pending.is_empty());
    }
}
