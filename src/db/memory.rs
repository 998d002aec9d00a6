use crate::core::{HistoryProvider, NewTask, Task, TaskPatch, TaskStore, ThreadLog};
use crate::errors::{Error, Result};
use crate::utils::{next_version, now_rfc3339};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-process task store with the same rules as the SQLite one
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<HashMap<String, Task>>,
}

impl MemoryTaskStore {
    /// Every stored task, for inspection
    pub async fn all(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        tasks
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn find_active(&self, ext_id: &str) -> Result<Option<Task>> {
        Ok(self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.ext_id == ext_id && !t.status.is_terminal())
            .max_by(|a, b| a.updated_at.cmp(&b.updated_at))
            .cloned())
    }

    async fn get(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn create(&self, new_task: NewTask) -> Result<Task> {
        let mut tasks = self.tasks.write().await;
        if let Some(active) = tasks
            .values()
            .find(|t| t.ext_id == new_task.ext_id && !t.status.is_terminal())
        {
            return Err(Error::Conflict(format!(
                "thread {} already has active task {}",
                new_task.ext_id, active.id
            )));
        }
        let task = Task::from_new(Uuid::new_v4().to_string(), new_task, now_rfc3339());
        tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn update(&self, id: &str, expected_version: &str, patch: &TaskPatch) -> Result<Task> {
        let mut tasks = self.tasks.write().await;
        let stored = tasks
            .get(id)
            .ok_or_else(|| Error::Validation(format!("task {} does not exist", id)))?;
        if stored.updated_at != expected_version {
            return Err(Error::Conflict(format!(
                "task {} changed since version {}",
                id, expected_version
            )));
        }

        let mut task = stored.clone();
        task.apply_patch(patch)?;
        if !task.status.is_terminal()
            && tasks
                .values()
                .any(|t| t.id != id && t.ext_id == task.ext_id && !t.status.is_terminal())
        {
            return Err(Error::Conflict(format!(
                "thread {} already has an active task",
                task.ext_id
            )));
        }
        task.updated_at = next_version(expected_version);
        tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }
}

/// In-process conversation history
#[derive(Debug, Default)]
pub struct MemoryHistory {
    threads: RwLock<HashMap<String, Vec<ThreadLog>>>,
}

#[async_trait]
impl HistoryProvider for MemoryHistory {
    async fn load_thread(&self, ext_id: &str) -> Result<Option<Vec<ThreadLog>>> {
        Ok(self.threads.read().await.get(ext_id).cloned())
    }

    async fn record_turn(&self, ext_id: &str, log: ThreadLog) -> Result<()> {
        self.threads
            .write()
            .await
            .entry(ext_id.to_string())
            .or_default()
            .push(log);
        Ok(())
    }
}
