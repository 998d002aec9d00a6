use crate::core::{Task, TaskStatus, ThreadLog};
use crate::errors::{Error, Result};
use crate::schema::{tasks, thread_logs};
use diesel::{AsChangeset, Identifiable, Insertable, Queryable, Selectable};

/// Represents a task in the database
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, AsChangeset, Insertable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct TaskRow {
    pub id: String,
    /// External conversation identifier
    pub ext_id: String,
    pub status: String,
    pub workflow: String,
    pub current_step: Option<String>,
    /// JSON serialized task context
    pub context: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskRow {
    pub fn from_task(task: &Task) -> Result<Self> {
        Ok(TaskRow {
            id: task.id.clone(),
            ext_id: task.ext_id.clone(),
            status: task.status.as_str().to_string(),
            workflow: task.workflow.clone(),
            current_step: task.current_step.clone(),
            context: serde_json::to_string(&task.context)?,
            created_at: task.created_at.clone(),
            updated_at: task.updated_at.clone(),
        })
    }

    pub fn into_task(self) -> Result<Task> {
        let status = self.status.parse::<TaskStatus>().map_err(|_| {
            Error::Validation(format!("task {} has unknown status '{}'", self.id, self.status))
        })?;
        Ok(Task {
            status,
            context: serde_json::from_str(&self.context)?,
            id: self.id,
            ext_id: self.ext_id,
            workflow: self.workflow,
            current_step: self.current_step,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Represents one recorded conversation turn
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = thread_logs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ThreadLogRow {
    pub id: String,
    pub ext_id: String,
    pub input: Option<String>,
    /// JSON serialized response
    pub response: String,
    pub created_at: String,
}

impl ThreadLogRow {
    pub fn into_log(self) -> Result<ThreadLog> {
        Ok(ThreadLog {
            input: self.input,
            response: serde_json::from_str(&self.response)?,
            created_at: self.created_at,
        })
    }
}
