use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use stepwise::actions::ActionRegistry;
use stepwise::agents::{AgentReply, AgentRequest, ReasoningDelegate};
use stepwise::config::parse_engine_config;
use stepwise::constants::INVALID_RESPONSE;
use stepwise::core::{NewTask, Task, TaskStatus, TaskStore, WorkflowCatalog, WorkflowStore};
use stepwise::db::{MemoryHistory, MemoryTaskStore};
use stepwise::event::Event;
use stepwise::{EngineContext, EngineSettings, Result, TaskManager, TurnRequest};

const CONFIG: &str = r#"
name: test
parameters:
  default_job: support
  history_retry_delay: 1ms
jobs:
  - name: support
    actions:
      - name: lookupAccount
        module: native:echo
    workflows:
      - name: Onboarding
        description: Sign a customer up
        steps:
          - name: collect
            description: Collect the email
            instructions: Ask for the email address
            submit_when: the email is known
            next: confirm
            failed_next: abort
            actions: [lookupAccount]
          - name: confirm
            description: Confirm the data
            instructions: Ask the user to confirm
            submit_when: the user confirmed
          - name: abort
            description: Give up
"#;

const WORKFLOW: &str = "job.support/onboarding";
const COLLECT: &str = "job.support/onboarding::collect";
const CONFIRM: &str = "job.support/onboarding::confirm";
const ABORT: &str = "job.support/onboarding::abort";

/// What the delegate does on one iteration
#[derive(Clone)]
enum Script {
    /// Runs the calls against the offered actions, then answers with the message
    Calls(&'static str, Vec<(&'static str, Value)>),
    /// Returns this body as is
    Raw(Value),
}

/// What the delegate was given on one iteration
struct Seen {
    instructions: String,
    history_len: usize,
    actions: Vec<String>,
}

struct ScriptedDelegate {
    scripts: Mutex<VecDeque<Script>>,
    /// Replay the last script forever instead of answering plainly
    repeat_last: bool,
    seen: Mutex<Vec<Seen>>,
}

impl ScriptedDelegate {
    fn new(scripts: Vec<Script>, repeat_last: bool) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            repeat_last,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn next_script(&self) -> Script {
        let mut scripts = self.scripts.lock().unwrap();
        if self.repeat_last && scripts.len() == 1 {
            return scripts[0].clone();
        }
        scripts
            .pop_front()
            .unwrap_or(Script::Calls("done", vec![]))
    }
}

#[async_trait]
impl ReasoningDelegate for ScriptedDelegate {
    async fn run(&self, request: AgentRequest) -> Result<AgentReply> {
        self.seen.lock().unwrap().push(Seen {
            instructions: request.instructions.clone(),
            history_len: request.history.len(),
            actions: request.actions.names().iter().map(|n| n.to_string()).collect(),
        });

        let body = match self.next_script() {
            Script::Raw(body) => body,
            Script::Calls(message, calls) => {
                let mut functions = Vec::new();
                for (name, args) in calls {
                    let (results, status) = match request.actions.invoke(name, args.clone()).await {
                        Ok(results) => {
                            let status = if results.get("status") == Some(&json!("failed")) {
                                "failed"
                            } else {
                                "completed"
                            };
                            (results, status)
                        }
                        Err(e) => (json!({ "error": e.to_string() }), "failed"),
                    };
                    functions.push(json!({
                        "name": name,
                        "args": args,
                        "results": results,
                        "status": status
                    }));
                }
                json!({ "message": message, "functions": functions })
            }
        };
        Ok(AgentReply {
            prompt: request.instructions,
            body,
        })
    }
}

struct Harness {
    manager: TaskManager,
    store: Arc<MemoryTaskStore>,
    delegate: Arc<ScriptedDelegate>,
}

fn harness(scripts: Vec<Script>, repeat_last: bool) -> Harness {
    harness_with(CONFIG, scripts, repeat_last)
}

fn harness_with(yaml: &str, scripts: Vec<Script>, repeat_last: bool) -> Harness {
    let config = parse_engine_config(yaml).unwrap();
    let catalog = WorkflowCatalog::from_config(&config).unwrap();
    let registry = ActionRegistry::from_config(&config).unwrap();
    let store = Arc::new(MemoryTaskStore::default());
    let delegate = ScriptedDelegate::new(scripts, repeat_last);

    let ctx = EngineContext::new(
        store.clone(),
        Arc::new(catalog),
        Arc::new(MemoryHistory::default()),
        delegate.clone(),
    )
    .with_registry(Arc::new(registry))
    .with_settings(EngineSettings::from_config(&config));

    Harness {
        manager: TaskManager::new(ctx),
        store,
        delegate,
    }
}

async fn seed_task(store: &MemoryTaskStore, step: &str) -> Task {
    store
        .create(NewTask {
            ext_id: "thread-1".into(),
            workflow: WORKFLOW.into(),
            current_step: Some(step.into()),
            context: Map::new(),
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn create_task_starts_first_step_and_continues() {
    let h = harness(
        vec![Script::Calls(
            "Let's get you signed up",
            vec![("createTask", json!({ "workflowName": "onboarding" }))],
        )],
        false,
    );
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut request = TurnRequest::new("thread-1", "I want to sign up");
    request.user = json!({ "name": "Ada" });
    request.stream = Some(tx);

    let turn = h.manager.handle_turn(request).await.unwrap();

    let tasks = h.store.all().await;
    assert_eq!(tasks.len(), 1);
    let task = &tasks[0];
    assert_eq!(task.status, TaskStatus::Active);
    assert_eq!(task.current_step.as_deref(), Some(COLLECT));
    assert_eq!(task.context["user"]["name"], "Ada");
    assert!(task.context.contains_key("createdAt"));

    // createTask changed the task, so the delegate ran again on the first step
    assert_eq!(h.delegate.calls(), 2);
    assert_eq!(turn.consumption.value, 2);
    assert_eq!(turn.consumption.kind, "steps");
    let seen = h.delegate.seen.lock().unwrap();
    assert!(seen[0].instructions.contains("- Onboarding: Sign a customer up"));
    assert!(seen[1].instructions.contains("The current step is \"collect\""));
    assert!(seen[1].actions.contains(&"lookupAccount".to_string()));
    assert_eq!(seen[1].history_len, seen[0].history_len + 1);
    drop(seen);

    assert!(matches!(rx.try_recv(), Ok(Event::TaskCreated(..))));
}

#[tokio::test]
async fn create_task_without_workflow_name_reports_failure() {
    let h = harness(
        vec![Script::Calls("Which one?", vec![("createTask", json!({}))])],
        false,
    );

    let turn = h
        .manager
        .handle_turn(TurnRequest::new("thread-1", "start something"))
        .await
        .unwrap();

    let call = &turn.functions()[0];
    assert_eq!(call.name, "createTask");
    assert_eq!(call.status.as_deref(), Some("failed"));
    assert!(call.results["error"]
        .as_str()
        .unwrap()
        .contains("Missing argument: workflowName"));
    assert!(h.store.all().await.is_empty());
    assert_eq!(turn.consumption.value, 1);
}

#[tokio::test]
async fn create_task_for_unknown_workflow_reports_failure() {
    let h = harness(
        vec![Script::Calls(
            "I cannot help with that",
            vec![("createTask", json!({ "workflowName": "Mortgage" }))],
        )],
        false,
    );

    let turn = h
        .manager
        .handle_turn(TurnRequest::new("thread-1", "I want a mortgage"))
        .await
        .unwrap();

    let call = &turn.functions()[0];
    assert_eq!(call.status.as_deref(), Some("failed"));
    assert!(call.results["error"]
        .as_str()
        .unwrap()
        .contains("Workflow not found: Mortgage"));
    assert!(h.store.all().await.is_empty());
    assert_eq!(h.delegate.calls(), 1);
}

#[tokio::test]
async fn create_task_finds_copilot_workflows() {
    let yaml = format!(
        "{}copilots:\n  - name: helper\n    workflows:\n      - name: Feedback\n        steps:\n          - name: ask\n            description: Ask for feedback\n",
        CONFIG.replace("  default_job: support\n", "  default_job: support\n  default_copilot: helper\n")
    );
    let h = harness_with(
        &yaml,
        vec![Script::Calls(
            "Tell me more",
            vec![("createTask", json!({ "workflowName": "FEEDBACK" }))],
        )],
        false,
    );

    let turn = h
        .manager
        .handle_turn(TurnRequest::new("thread-1", "I have feedback"))
        .await
        .unwrap();

    assert_eq!(turn.functions()[0].status.as_deref(), Some("completed"));
    let task = h.store.find_active("thread-1").await.unwrap().unwrap();
    assert_eq!(task.workflow, "copilot.helper/feedback");
    assert_eq!(task.current_step.as_deref(), Some("copilot.helper/feedback::ask"));
    let seen = h.delegate.seen.lock().unwrap();
    assert!(seen[0].instructions.contains("- Feedback: "));
}

#[tokio::test]
async fn submit_advances_to_next_step() {
    let h = harness(
        vec![Script::Calls(
            "Thanks",
            vec![("submit", json!({ "email": "ada@example.com" }))],
        )],
        false,
    );
    seed_task(&h.store, COLLECT).await;

    let turn = h
        .manager
        .handle_turn(TurnRequest::new("thread-1", "ada@example.com"))
        .await
        .unwrap();

    let task = h.store.find_active("thread-1").await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Active);
    assert_eq!(task.current_step.as_deref(), Some(CONFIRM));
    assert_eq!(
        task.context["steps"]["0"]["submitParams"]["email"],
        "ada@example.com"
    );
    assert_eq!(turn.consumption.value, 2);
}

#[tokio::test]
async fn terminal_submit_completes_without_continuing() {
    let h = harness(
        vec![Script::Calls("All done", vec![("submit", json!({ "confirmed": true }))])],
        false,
    );
    let seeded = seed_task(&h.store, CONFIRM).await;

    let turn = h
        .manager
        .handle_turn(TurnRequest::new("thread-1", "yes"))
        .await
        .unwrap();

    let task = h.store.get(&seeded.id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.context["steps"]["1"]["submitParams"]["confirmed"], true);
    assert_eq!(h.delegate.calls(), 1);
    assert_eq!(turn.consumption.value, 1);
    assert_eq!(turn.message(), "All done");
    assert!(h.store.find_active("thread-1").await.unwrap().is_none());
}

#[tokio::test]
async fn failed_submit_moves_to_failed_next() {
    let h = harness(
        vec![Script::Calls(
            "Sorry",
            vec![("submit", json!({ "status": "failed", "reason": "no email" }))],
        )],
        false,
    );
    let seeded = seed_task(&h.store, COLLECT).await;

    let turn = h
        .manager
        .handle_turn(TurnRequest::new("thread-1", "I have no email"))
        .await
        .unwrap();

    let task = h.store.get(&seeded.id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.current_step.as_deref(), Some(ABORT));
    assert_eq!(turn.consumption.value, 1);
    assert_eq!(turn.functions()[0].status.as_deref(), Some("failed"));
}

#[tokio::test]
async fn recursion_is_bounded() {
    let h = harness(
        vec![Script::Calls(
            "Again",
            vec![("changeStep", json!({ "name": "collect" }))],
        )],
        true,
    );
    seed_task(&h.store, CONFIRM).await;

    let turn = h
        .manager
        .handle_turn(TurnRequest::new("thread-1", "go back"))
        .await
        .unwrap();

    assert_eq!(h.delegate.calls(), 4);
    assert_eq!(turn.consumption.value, 4);
    let task = h.store.find_active("thread-1").await.unwrap().unwrap();
    assert_eq!(task.current_step.as_deref(), Some(COLLECT));
}

#[tokio::test]
async fn invalid_response_is_annotated_not_raised() {
    let h = harness(
        vec![Script::Raw(json!({
            "functions": [{ "name": "submit", "args": { "email": "x" } }]
        }))],
        false,
    );
    let seeded = seed_task(&h.store, COLLECT).await;

    let turn = h
        .manager
        .handle_turn(TurnRequest::new("thread-1", "x"))
        .await
        .unwrap();

    assert_eq!(turn.error_code(), Some(INVALID_RESPONSE));
    assert_eq!(turn.functions()[0].name, "submit");
    assert_eq!(turn.consumption.value, 1);
    let task = h.store.get(&seeded.id).await.unwrap().unwrap();
    assert_eq!(task, seeded);
}

#[tokio::test]
async fn invalid_message_is_preserved() {
    let h = harness(vec![Script::Raw(json!({ "message": "hi", "functions": "nope" }))], false);
    let turn = h
        .manager
        .handle_turn(TurnRequest::new("thread-1", "hello"))
        .await
        .unwrap();
    assert_eq!(turn.error_code(), Some(INVALID_RESPONSE));
    assert_eq!(turn.message(), "hi");
    assert_eq!(turn.body["functions"], "nope");
}

#[tokio::test]
async fn change_step_to_unknown_step_leaves_task_untouched() {
    let h = harness(
        vec![Script::Calls(
            "Hmm",
            vec![("changeStep", json!({ "name": "nowhere" }))],
        )],
        false,
    );
    let seeded = seed_task(&h.store, COLLECT).await;

    let turn = h
        .manager
        .handle_turn(TurnRequest::new("thread-1", "skip ahead"))
        .await
        .unwrap();

    let call = &turn.functions()[0];
    assert_eq!(call.status.as_deref(), Some("failed"));
    assert!(call.results["error"].as_str().unwrap().contains("nowhere"));
    assert_eq!(h.store.get(&seeded.id).await.unwrap().unwrap(), seeded);
    assert_eq!(turn.consumption.value, 1);
}

#[tokio::test]
async fn list_steps_is_idempotent() {
    let h = harness(
        vec![Script::Calls(
            "Here are the steps",
            vec![("listSteps", json!({})), ("listSteps", json!({}))],
        )],
        false,
    );
    seed_task(&h.store, COLLECT).await;

    let turn = h
        .manager
        .handle_turn(TurnRequest::new("thread-1", "what are the steps?"))
        .await
        .unwrap();

    let functions = turn.functions();
    assert_eq!(functions[0].results, functions[1].results);
    assert_eq!(
        functions[0].results,
        json!([
            { "name": "collect", "description": "Collect the email" },
            { "name": "confirm", "description": "Confirm the data" },
            { "name": "abort", "description": "Give up" }
        ])
    );
    // read-only calls do not continue the turn
    assert_eq!(turn.consumption.value, 1);
}

#[tokio::test]
async fn recorded_turns_are_replayed_as_history() {
    let h = harness(
        vec![
            Script::Calls("first", vec![]),
            Script::Calls("second", vec![]),
        ],
        false,
    );

    h.manager
        .handle_turn(TurnRequest::new("thread-1", "one"))
        .await
        .unwrap();
    h.manager
        .handle_turn(TurnRequest::new("thread-1", "two"))
        .await
        .unwrap();

    let seen = h.delegate.seen.lock().unwrap();
    assert_eq!(seen[0].history_len, 1);
    // previous user input, previous response, new input
    assert_eq!(seen[1].history_len, 3);
}

#[test]
fn demo_configuration_is_consistent() {
    let config = parse_engine_config(include_str!("../demos/onboarding.yaml")).unwrap();
    let catalog = WorkflowCatalog::from_config(&config).unwrap();
    ActionRegistry::from_config(&config).unwrap();

    let offered = catalog.workflows_for(Some("support"), Some("assistant"));
    let names: Vec<&str> = offered.iter().map(|w| w.name.as_str()).collect();
    assert_eq!(names, vec!["Onboarding", "Data export"]);
    assert!(catalog.workflow("copilot.assistant/data-export").is_some());
}
