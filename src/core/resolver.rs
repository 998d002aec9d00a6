use super::{Job, Step, Task, TaskStore, Workflow, WorkflowStore};
use crate::errors::{Error, Result};
use tracing::debug;

/// What is known about a conversation before the delegate runs
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub task: Option<Task>,
    pub workflow: Option<Workflow>,
    pub step: Option<Step>,
    /// Job whose actions the current step may bind
    pub job: Option<Job>,
}

/// Loads the active task of a conversation with its workflow and current step
pub struct TaskResolver<'a> {
    store: &'a dyn TaskStore,
    workflows: &'a dyn WorkflowStore,
}

impl<'a> TaskResolver<'a> {
    pub fn new(store: &'a dyn TaskStore, workflows: &'a dyn WorkflowStore) -> Self {
        Self { store, workflows }
    }

    /// Read-only; absence of an active task is an empty resolution
    ///
    /// # Errors
    /// * store errors
    /// * `Error::WorkflowNotFound` / `Error::StepNotFound` - the task points outside the catalog
    pub async fn resolve(&self, ext_id: &str, ambient_job: Option<&str>) -> Result<Resolution> {
        let ambient = ambient_job.and_then(|name| self.workflows.job(name));
        let Some(task) = self.store.find_active(ext_id).await? else {
            debug!("No active task for thread {}", ext_id);
            return Ok(Resolution {
                job: ambient,
                ..Default::default()
            });
        };

        let workflow = self
            .workflows
            .workflow(&task.workflow)
            .ok_or_else(|| Error::WorkflowNotFound(task.workflow.clone()))?;
        let step = match &task.current_step {
            Some(id) => Some(
                workflow
                    .step(id)
                    .cloned()
                    .ok_or_else(|| Error::StepNotFound(id.clone()))?,
            ),
            None => None,
        };

        let job = match step.as_ref().and_then(|s| s.job.as_deref()) {
            Some(name) if Some(name) != ambient_job => {
                debug!("Step overrides job with '{}'", name);
                self.workflows.job(name)
            }
            _ => ambient,
        };

        debug!(
            "Thread {} has task {} at step {:?}",
            ext_id,
            task.id,
            step.as_ref().map(|s| s.name.as_str())
        );
        Ok(Resolution {
            task: Some(task),
            workflow: Some(workflow),
            step,
            job,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_engine_config;
    use crate::core::{NewTask, WorkflowCatalog};
    use crate::db::MemoryTaskStore;
    use serde_json::Map;

    const CONFIG: &str = r#"
name: test
jobs:
  - name: main
    workflows:
      - name: Onboarding
        steps:
          - name: collect
            next: verify
          - name: verify
            job: compliance
  - name: compliance
    actions:
      - name: checkId
        module: native:echo
"#;

    #[tokio::test]
    async fn resolves_task_workflow_step_and_job_override() {
        let catalog = WorkflowCatalog::from_config(&parse_engine_config(CONFIG).unwrap()).unwrap();
        let store = MemoryTaskStore::default();
        let resolver = TaskResolver::new(&store, &catalog);

        let empty = resolver.resolve("t", Some("main")).await.unwrap();
        assert!(empty.task.is_none());
        assert_eq!(empty.job.unwrap().name, "main");

        store
            .create(NewTask {
                ext_id: "t".into(),
                workflow: "job.main/onboarding".into(),
                current_step: Some("job.main/onboarding::verify".into()),
                context: Map::new(),
            })
            .await
            .unwrap();

        let resolution = resolver.resolve("t", Some("main")).await.unwrap();
        assert_eq!(resolution.workflow.unwrap().name, "Onboarding");
        assert_eq!(resolution.step.unwrap().name, "verify");
        assert_eq!(resolution.job.unwrap().name, "compliance");
    }
}
