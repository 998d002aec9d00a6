use crate::config::{ActionConfig, EngineConfig, WorkflowConfig};
use crate::errors::{Error, Result};
use crate::utils::slugify;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// A unit of work within a workflow
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub name: String,
    pub description: String,
    pub instructions: String,
    /// Human readable completion condition
    pub submit_when: String,
    /// Following step id, `None` for a terminal step
    pub next: Option<String>,
    /// Step id taken when the step fails
    pub failed_next: Option<String>,
    /// Job action names available only in this step
    pub actions: Vec<String>,
    /// Job overriding the ambient one while this step runs
    pub job: Option<String>,
}

/// A named, ordered definition of steps
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub first_step: String,
    pub steps: Vec<Step>,
}

impl Workflow {
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Exact-name lookup
    pub fn step_by_name(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Position of a step in the declared order
    pub fn step_index(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }
}

/// A job: owns workflows and the external actions their steps may bind
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub name: String,
    pub actions: Vec<ActionConfig>,
    pub workflows: Vec<String>,
}

impl Job {
    pub fn action(&self, name: &str) -> Option<&ActionConfig> {
        self.actions.iter().find(|a| a.name == name)
    }
}

/// Read access to workflow definitions
pub trait WorkflowStore: Send + Sync {
    fn workflow(&self, id: &str) -> Option<Workflow>;

    /// Workflows of the job followed by those of the copilot
    fn workflows_for(&self, job: Option<&str>, copilot: Option<&str>) -> Vec<Workflow>;

    /// Case-insensitive name lookup across the job and copilot workflows
    fn find_workflow(&self, job: Option<&str>, copilot: Option<&str>, name: &str) -> Option<Workflow> {
        self.workflows_for(job, copilot)
            .into_iter()
            .find(|w| same_name(&w.name, name))
    }

    fn job(&self, name: &str) -> Option<Job>;
}

/// Case-insensitive name comparison shared by lookups and duplicate checks
fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Workflow definitions loaded from the engine configuration
///
/// Identifiers are derived from names so that persisted tasks keep pointing
/// at the same workflow and step across restarts.
#[derive(Debug, Clone, Default)]
pub struct WorkflowCatalog {
    workflows: HashMap<String, Workflow>,
    jobs: HashMap<String, Job>,
    copilots: HashMap<String, Vec<String>>,
}

impl WorkflowCatalog {
    /// Builds and validates the catalog
    ///
    /// # Errors
    /// * `Error::Config` - duplicated names or dangling step, job or action references
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let mut catalog = WorkflowCatalog::default();
        let mut owners = HashSet::new();

        for job in &config.jobs {
            let owner = claim_id(&mut owners, format!("job.{}", slugify(&job.name)), "job", &job.name)?;
            let ids = catalog.add_workflows(&owner, &job.workflows)?;
            catalog.jobs.insert(
                job.name.clone(),
                Job {
                    name: job.name.clone(),
                    actions: job.actions.clone(),
                    workflows: ids,
                },
            );
        }

        for copilot in &config.copilots {
            let owner = claim_id(
                &mut owners,
                format!("copilot.{}", slugify(&copilot.name)),
                "copilot",
                &copilot.name,
            )?;
            let ids = catalog.add_workflows(&owner, &copilot.workflows)?;
            catalog.copilots.insert(copilot.name.clone(), ids);
        }

        catalog.check_step_bindings(config)?;
        Ok(catalog)
    }

    fn add_workflows(&mut self, owner: &str, workflows: &[WorkflowConfig]) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(workflows.len());
        for (i, wc) in workflows.iter().enumerate() {
            if let Some(previous) = workflows[..i].iter().find(|w| same_name(&w.name, &wc.name)) {
                return Err(Error::Config(format!(
                    "workflow '{}' is declared twice in {} (as '{}')",
                    wc.name, owner, previous.name
                )));
            }
            let workflow = build_workflow(owner, wc)?;
            if self.workflows.contains_key(&workflow.id) {
                return Err(Error::Config(format!(
                    "workflow '{}' maps to id '{}' which is already taken",
                    wc.name, workflow.id
                )));
            }
            ids.push(workflow.id.clone());
            self.workflows.insert(workflow.id.clone(), workflow);
        }
        Ok(ids)
    }

    fn check_step_bindings(&self, config: &EngineConfig) -> Result<()> {
        let owners = config
            .jobs
            .iter()
            .map(|j| (Some(j.name.as_str()), &j.workflows))
            .chain(config.copilots.iter().map(|c| (None, &c.workflows)));

        for (owning_job, workflows) in owners {
            for wc in workflows {
                for sc in &wc.steps {
                    if let Some(job) = &sc.job {
                        if !self.jobs.contains_key(job) {
                            return Err(Error::Config(format!(
                                "step '{}' of '{}' references unknown job '{}'",
                                sc.name, wc.name, job
                            )));
                        }
                    }
                    let effective_job = sc
                        .job
                        .as_deref()
                        .or(owning_job)
                        .or(config.parameters.default_job.as_deref())
                        .and_then(|name| self.jobs.get(name));
                    for action in &sc.actions {
                        if effective_job.and_then(|j| j.action(action)).is_none() {
                            return Err(Error::Config(format!(
                                "step '{}' of '{}' binds unknown action '{}'",
                                sc.name, wc.name, action
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}

/// Reserves an owner id, rejecting names that collide once slugified
fn claim_id(taken: &mut HashSet<String>, id: String, kind: &str, name: &str) -> Result<String> {
    if name.trim().is_empty() || id.ends_with('.') {
        return Err(Error::Config(format!("{} name '{}' has no usable characters", kind, name)));
    }
    if !taken.insert(id.clone()) {
        return Err(Error::Config(format!("{} '{}' collides with another owner id '{}'", kind, name, id)));
    }
    Ok(id)
}

fn build_workflow(owner: &str, wc: &WorkflowConfig) -> Result<Workflow> {
    let slug = slugify(&wc.name);
    if slug.is_empty() {
        return Err(Error::Config(format!("workflow name '{}' has no usable characters", wc.name)));
    }
    let id = format!("{}/{}", owner, slug);
    let step_id = |name: &str| format!("{}::{}", id, name);

    let names: HashSet<&str> = wc.steps.iter().map(|s| s.name.as_str()).collect();
    if names.len() != wc.steps.len() {
        return Err(Error::Config(format!("workflow '{}' has duplicate step names", wc.name)));
    }
    let resolve = |reference: &Option<String>, field: &str, step: &str| -> Result<Option<String>> {
        match reference {
            Some(name) if names.contains(name.as_str()) => Ok(Some(step_id(name))),
            Some(name) => Err(Error::Config(format!(
                "{} '{}' of step '{}' in workflow '{}' does not exist",
                field, name, step, wc.name
            ))),
            None => Ok(None),
        }
    };

    let mut steps = Vec::with_capacity(wc.steps.len());
    for sc in &wc.steps {
        steps.push(Step {
            id: step_id(&sc.name),
            name: sc.name.clone(),
            description: sc.description.clone(),
            instructions: sc.instructions.clone(),
            submit_when: sc.submit_when.clone(),
            next: resolve(&sc.next, "next", &sc.name)?,
            failed_next: resolve(&sc.failed_next, "failed_next", &sc.name)?,
            actions: sc.actions.clone(),
            job: sc.job.clone(),
        });
    }

    let first_step = match &wc.first_step {
        Some(_) => resolve(&wc.first_step, "first_step", "-")?,
        None => steps.first().map(|s| s.id.clone()),
    }
    .ok_or_else(|| Error::Config(format!("workflow '{}' has no steps", wc.name)))?;

    Ok(Workflow {
        id,
        name: wc.name.clone(),
        description: wc.description.clone(),
        first_step,
        steps,
    })
}

impl WorkflowStore for WorkflowCatalog {
    fn workflow(&self, id: &str) -> Option<Workflow> {
        self.workflows.get(id).cloned()
    }

    fn workflows_for(&self, job: Option<&str>, copilot: Option<&str>) -> Vec<Workflow> {
        let job_ids = job
            .and_then(|name| self.jobs.get(name))
            .map(|j| j.workflows.as_slice())
            .unwrap_or_default();
        let copilot_ids = copilot
            .and_then(|name| self.copilots.get(name))
            .map(|ids| ids.as_slice())
            .unwrap_or_default();

        job_ids
            .iter()
            .chain(copilot_ids.iter())
            .filter_map(|id| self.workflows.get(id).cloned())
            .collect()
    }

    fn job(&self, name: &str) -> Option<Job> {
        self.jobs.get(name).cloned()
    }
}
