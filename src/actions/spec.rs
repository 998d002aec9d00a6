use crate::errors::{Error, Result};
use crate::llm::{FunctionDefinition, ToolDefinition};
use serde_json::{json, Map, Value};

/// One declared argument of an action
#[derive(Debug, Clone, PartialEq)]
pub struct ActionArg {
    pub name: String,
    /// JSON type name, `any` when omitted
    pub kind: String,
    pub optional: bool,
}

/// Parsed form of `name<arg:type,opt?:type,*>(description)->(returns)`
///
/// A `*` in the argument list accepts free-form extra arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSpec {
    pub name: String,
    pub args: Vec<ActionArg>,
    pub free_form: bool,
    pub description: String,
    pub returns: String,
}

impl ActionSpec {
    /// # Errors
    /// * `Error::Config` - the string does not follow `name<args>(description)->(returns)`
    pub fn parse(spec: &str) -> Result<Self> {
        let malformed = |why: &str| Error::Config(format!("malformed action spec '{}': {}", spec, why));

        let (name, rest) = spec.split_once('<').ok_or_else(|| malformed("missing '<'"))?;
        let (args_str, rest) = rest.split_once('>').ok_or_else(|| malformed("missing '>'"))?;
        let rest = rest.trim_start();
        let rest = rest.strip_prefix('(').ok_or_else(|| malformed("missing description"))?;
        let (description, returns) = match rest.rfind(")->(") {
            Some(idx) => {
                let returns = rest[idx + 4..]
                    .strip_suffix(')')
                    .ok_or_else(|| malformed("unterminated return description"))?;
                (&rest[..idx], returns)
            }
            None => (
                rest.strip_suffix(')')
                    .ok_or_else(|| malformed("unterminated description"))?,
                "",
            ),
        };

        let name = name.trim();
        if name.is_empty() {
            return Err(malformed("empty name"));
        }

        let mut args = Vec::new();
        let mut free_form = false;
        for raw in args_str.split(',').map(str::trim).filter(|a| !a.is_empty()) {
            if raw == "*" {
                free_form = true;
                continue;
            }
            let (arg_name, kind) = raw.split_once(':').unwrap_or((raw, "any"));
            let (arg_name, optional) = match arg_name.trim().strip_suffix('?') {
                Some(n) => (n, true),
                None => (arg_name.trim(), false),
            };
            args.push(ActionArg {
                name: arg_name.to_string(),
                kind: kind.trim().to_string(),
                optional,
            });
        }

        Ok(ActionSpec {
            name: name.to_string(),
            args,
            free_form,
            description: description.trim().to_string(),
            returns: returns.trim().to_string(),
        })
    }

    /// Function-calling tool advertised to the model
    pub fn to_tool_definition(&self) -> ToolDefinition {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for arg in &self.args {
            let schema = match arg.kind.as_str() {
                "any" => json!({}),
                kind => json!({ "type": kind }),
            };
            properties.insert(arg.name.clone(), schema);
            if !arg.optional {
                required.push(Value::String(arg.name.clone()));
            }
        }

        let description = if self.returns.is_empty() {
            self.description.clone()
        } else {
            format!("{} Returns: {}", self.description, self.returns)
        };

        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name.clone(),
                description,
                parameters: json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                    "additionalProperties": self.free_form,
                }),
            },
        }
    }
}
