/// Maximum number of recursive continuations a single turn may drive
pub const MAX_ITERATIONS: usize = 3;

/// Default number of attempts when fetching thread history
pub const DEFAULT_HISTORY_RETRIES: usize = 3;

/// Default delay between two history fetch attempts
pub const DEFAULT_HISTORY_RETRY_DELAY: &str = "250ms";

/// Maximum number of tool-call rounds the function-calling agent performs per iteration
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

/// Error code attached to agent responses failing the output schema
pub const INVALID_RESPONSE: &str = "INVALID_RESPONSE";

/// Consumption unit reported on every turn
pub const CONSUMPTION_STEPS: &str = "steps";

/// Function name the history lookup is performed on behalf of
pub const HISTORY_FUNCTION_NAME: &str = "taskManager";

/// Instruction prefix used while a task is active.
pub const STEP_PROMPT_TEMPLATE: &str = "You are executing the workflow \"{{workflowName}}\": {{workflowDescription}}
The workflow is made of the following steps: {{steps}}.
The current step is \"{{stepName}}\".

Step instructions:
{{stepInstructions}}

Current task context:
{{context}}

Call the `submit` function with the collected data once the following condition is met: {{submitWhen}}
If the step cannot be completed, call `submit` with a failed status. Use `changeStep` only when the user explicitly asks to move to another step.

";

/// Instruction prefix used while no task is active.
pub const WORKFLOW_SELECTION_TEMPLATE: &str = "You can help the user with the following workflows:
{{workflows}}

Once you have identified which workflow matches the user's intent, call the `createTask` function with its name as `workflowName`.

";

/// Default system instructions when the configuration provides none
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful assistant guiding the user through structured tasks. Answer concisely.";
