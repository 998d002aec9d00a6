use super::patch::TaskPatch;
use super::task::{NewTask, Task};
use crate::errors::Result;
use async_trait::async_trait;

/// Keyed document store for tasks
///
/// Updates are "find then update": the stored task is loaded, the patch is
/// applied to it and the result written back, provided the stored version
/// still matches `expected_version`.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Most recently updated active task of a conversation
    async fn find_active(&self, ext_id: &str) -> Result<Option<Task>>;

    async fn get(&self, id: &str) -> Result<Option<Task>>;

    /// Inserts an active task
    ///
    /// # Errors
    /// * `Error::Conflict` - the conversation already has an active task
    async fn create(&self, new_task: NewTask) -> Result<Task>;

    /// Applies `patch` and returns the stored task
    ///
    /// # Errors
    /// * `Error::Conflict` - the task changed since `expected_version` was read
    /// * `Error::Validation` - the patch is not applicable
    async fn update(&self, id: &str, expected_version: &str, patch: &TaskPatch) -> Result<Task>;
}
