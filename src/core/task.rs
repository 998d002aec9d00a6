use super::patch::TaskPatch;
use super::task_state::TaskStatus;
use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Root fields a patch may assign; identity and timestamps are store-owned
const PATCHABLE_ROOTS: [&str; 4] = ["status", "workflow", "currentStep", "context"];

/// A workflow instantiated for one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Store identifier
    pub id: String,
    /// External conversation identifier
    pub ext_id: String,
    pub status: TaskStatus,
    /// Workflow identifier
    pub workflow: String,
    /// Identifier of the step being worked on
    pub current_step: Option<String>,
    /// Free-form data accumulated step after step
    pub context: Map<String, Value>,
    pub created_at: String,
    /// Also used as the optimistic concurrency version
    pub updated_at: String,
}

/// Fields required to create a task
#[derive(Debug, Clone)]
pub struct NewTask {
    pub ext_id: String,
    pub workflow: String,
    pub current_step: Option<String>,
    pub context: Map<String, Value>,
}

impl Task {
    /// Builds an active task from creation fields
    pub fn from_new(id: String, new_task: NewTask, now: String) -> Self {
        Self {
            id,
            ext_id: new_task.ext_id,
            status: TaskStatus::Active,
            workflow: new_task.workflow,
            current_step: new_task.current_step,
            context: new_task.context,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Applies every assignment of `patch` in order
    ///
    /// The task is left untouched when any assignment is rejected.
    ///
    /// # Errors
    /// * `Error::Validation` - a path targets a store-owned field or the result is not a valid task
    pub fn apply_patch(&mut self, patch: &TaskPatch) -> Result<()> {
        let mut doc = serde_json::to_value(&*self)?;
        for (path, value) in patch.assignments() {
            let root = path.split('.').next().unwrap_or_default();
            if !PATCHABLE_ROOTS.contains(&root) {
                return Err(Error::Validation(format!("path '{}' is not patchable", path)));
            }
            super::patch::set_path(&mut doc, path, value.clone())?;
        }
        let patched: Task = serde_json::from_value(doc)
            .map_err(|e| Error::Validation(format!("patch produced an invalid task: {}", e)))?;
        *self = patched;
        Ok(())
    }

    /// Essential fields returned to the agent after creation
    pub fn summary(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "status": self.status,
            "workflow": self.workflow,
            "currentStep": self.current_step,
        })
    }
}
