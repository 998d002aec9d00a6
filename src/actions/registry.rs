use super::http_action::HttpAction;
use super::native::{ClockAction, EchoAction, NativeAction};
use super::ActionModule;
use crate::config::{ActionConfig, EngineConfig};
use crate::errors::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Parsed module reference of an external action
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleRef {
    /// Handler of the local native namespace
    Native(String),
    /// Remote endpoint
    Http(Url),
}

impl ModuleRef {
    /// # Errors
    /// * `Error::Config` - not a URL, or a scheme other than `native`, `http` or `https`
    pub fn parse(reference: &str) -> Result<Self> {
        let url = Url::parse(reference.trim()).map_err(|e| {
            Error::Config(format!("invalid module reference '{}': {}", reference, e))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(ModuleRef::Http(url)),
            "native" => {
                let name = url.path().trim_matches('/');
                if name.is_empty() {
                    return Err(Error::Config(format!(
                        "native module reference '{}' has no name",
                        reference
                    )));
                }
                Ok(ModuleRef::Native(name.to_string()))
            }
            other => Err(Error::Config(format!(
                "unsupported module scheme '{}' in '{}'",
                other, reference
            ))),
        }
    }
}

enum Handler {
    Native(Arc<dyn NativeAction>),
    Http(HttpAction),
}

/// External action registered for a job
pub struct RegisteredAction {
    name: String,
    spec: String,
    handler: Handler,
}

#[async_trait]
impl ActionModule for RegisteredAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn spec(&self) -> &str {
        &self.spec
    }

    async fn call(&self, args: Value) -> Result<Value> {
        match &self.handler {
            Handler::Native(native) => native.call(args).await,
            Handler::Http(http) => http.call(&args).await,
        }
    }
}

/// Capability identifier to handler mapping
///
/// References are resolved when an action is registered, so a misconfigured
/// module fails at startup rather than in the middle of a conversation.
pub struct ActionRegistry {
    natives: HashMap<String, Arc<dyn NativeAction>>,
    /// Keyed by (job, action name)
    actions: HashMap<(String, String), Arc<RegisteredAction>>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionRegistry {
    /// Registry with the built-in native namespace
    pub fn new() -> Self {
        let mut registry = Self {
            natives: HashMap::new(),
            actions: HashMap::new(),
        };
        registry.register_native("echo", Arc::new(EchoAction));
        registry.register_native("clock", Arc::new(ClockAction));
        registry
    }

    /// Registers every job action of the configuration
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let mut registry = Self::new();
        for job in &config.jobs {
            for action in &job.actions {
                registry.register(&job.name, action)?;
            }
        }
        Ok(registry)
    }

    pub fn register_native(&mut self, name: &str, handler: Arc<dyn NativeAction>) {
        self.natives.insert(name.to_string(), handler);
    }

    /// Binds a job action to its handler
    ///
    /// # Errors
    /// * `Error::Config` - bad reference, unknown native handler or malformed spec
    pub fn register(&mut self, job: &str, action: &ActionConfig) -> Result<()> {
        let handler = match ModuleRef::parse(&action.module)? {
            ModuleRef::Native(name) => Handler::Native(
                self.natives
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| Error::Config(format!("unknown native module '{}'", name)))?,
            ),
            ModuleRef::Http(url) => Handler::Http(HttpAction::new(url)),
        };

        let spec = action.spec.clone().unwrap_or_else(|| {
            format!("{}<*>(Run the {} action)->(the action result)", action.name, action.name)
        });
        let parsed = super::ActionSpec::parse(&spec)?;
        if parsed.name != action.name {
            return Err(Error::Config(format!(
                "spec of action '{}' names '{}'",
                action.name, parsed.name
            )));
        }

        debug!("Registered action '{}' for job '{}' ({})", action.name, job, action.module);
        self.actions.insert(
            (job.to_string(), action.name.clone()),
            Arc::new(RegisteredAction {
                name: action.name.clone(),
                spec,
                handler,
            }),
        );
        Ok(())
    }

    pub fn resolve(&self, job: &str, name: &str) -> Option<Arc<dyn ActionModule>> {
        self.actions
            .get(&(job.to_string(), name.to_string()))
            .map(|a| a.clone() as Arc<dyn ActionModule>)
    }
}
