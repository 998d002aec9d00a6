use crate::core::Task;
use serde_json::Value;

/// Progress notifications sent on a caller's stream hook
///
/// The first field is always the external conversation identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A task was created for a conversation
    TaskCreated(String, Task),

    /// A task moved to another step: task id, step id
    StepChanged(String, String, String),

    /// A task reached its terminal step
    TaskCompleted(String, String),

    /// A task failed: task id, fallback step id if any
    TaskFailed(String, String, Option<String>),

    /// The delegate ran an action: name, status, results
    FunctionInvoked(String, String, String, Value),

    /// The delegate produced its final message
    Message(String, String),
}

impl Event {
    pub fn ext_id(&self) -> &str {
        match self {
            Event::TaskCreated(ext_id, _)
            | Event::StepChanged(ext_id, _, _)
            | Event::TaskCompleted(ext_id, _)
            | Event::TaskFailed(ext_id, _, _)
            | Event::FunctionInvoked(ext_id, _, _, _)
            | Event::Message(ext_id, _) => ext_id,
        }
    }
}

/// Optional stream hook forwarded by the caller
pub type EventSink = tokio::sync::mpsc::UnboundedSender<Event>;

/// Sends on the hook when one is attached; a closed receiver is ignored
pub fn emit(sink: Option<&EventSink>, event: Event) {
    if let Some(tx) = sink {
        let _ = tx.send(event);
    }
}
