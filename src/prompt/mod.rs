//! Instruction prefixes handed to the reasoning delegate.
//!
//! The orchestrator only chooses the template and its variables; rendering is
//! left to a [`PromptComposer`].

use crate::constants::{STEP_PROMPT_TEMPLATE, WORKFLOW_SELECTION_TEMPLATE};
use crate::core::{Step, Task, Workflow};
use std::collections::HashMap;

/// Renders a template with named variables
pub trait PromptComposer: Send + Sync {
    fn compose(&self, template: &str, vars: &HashMap<String, String>) -> String;
}

/// Substitutes `{{name}}` placeholders; unknown names render empty
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateComposer;

impl PromptComposer for TemplateComposer {
    fn compose(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find("}}") {
                Some(end) => {
                    let name = after[..end].trim();
                    if let Some(value) = vars.get(name) {
                        out.push_str(value);
                    }
                    rest = &after[end + 2..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Template and variables for a conversation with an active task
pub fn step_prompt_vars(workflow: &Workflow, step: &Step, task: &Task) -> (&'static str, HashMap<String, String>) {
    let context = serde_json::to_string_pretty(&task.context).unwrap_or_else(|_| "{}".to_string());
    let vars = HashMap::from([
        ("workflowName".to_string(), workflow.name.clone()),
        ("workflowDescription".to_string(), workflow.description.clone()),
        ("steps".to_string(), workflow.step_names().join(", ")),
        ("stepName".to_string(), step.name.clone()),
        ("stepInstructions".to_string(), step.instructions.clone()),
        ("context".to_string(), context),
        ("submitWhen".to_string(), step.submit_when.clone()),
    ]);
    (STEP_PROMPT_TEMPLATE, vars)
}

/// Template and variables for a conversation without an active task
pub fn workflow_selection_vars(workflows: &[Workflow]) -> (&'static str, HashMap<String, String>) {
    let listing = workflows
        .iter()
        .map(|w| format!("- {}: {}", w.name, w.description))
        .collect::<Vec<_>>()
        .join("\n");
    (
        WORKFLOW_SELECTION_TEMPLATE,
        HashMap::from([("workflows".to_string(), listing)]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_placeholders() {
        let vars = HashMap::from([("name".to_string(), "Ada".to_string())]);
        assert_eq!(
            TemplateComposer.compose("Hi {{ name }}, {{missing}}bye", &vars),
            "Hi Ada, bye"
        );
    }

    #[test]
    fn keeps_unterminated_braces() {
        let vars = HashMap::new();
        assert_eq!(TemplateComposer.compose("a {{b", &vars), "a {{b");
    }

    #[test]
    fn lists_workflows() {
        let workflows = vec![Workflow {
            id: "job.main/onboarding".into(),
            name: "Onboarding".into(),
            description: "Sign up".into(),
            first_step: "job.main/onboarding::a".into(),
            steps: vec![],
        }];
        let (template, vars) = workflow_selection_vars(&workflows);
        let prompt = TemplateComposer.compose(template, &vars);
        assert!(prompt.contains("- Onboarding: Sign up"));
        assert!(prompt.contains("createTask"));
    }
}
