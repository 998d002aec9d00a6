//! Output schema handling for agent responses.
//!
//! Schemas are written in a shorthand that is expanded to JSON Schema and
//! checked with `jsonschema`:
//!
//! - a type name: `"string"`, `"number"`, `"integer"`, `"boolean"`, `"object"`,
//!   `"array"`, `"null"` or `"any"`
//! - an object mapping keys to shorthands, a trailing `?` on a key marks it optional
//! - a one-element array giving the item shorthand (`[]` accepts any items)

use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};

use crate::errors::{Error, Result};
use tracing::warn;

/// Shorthand of the fields every agent response must carry
///
/// `functions` is optional: a delegate that answers without calling any
/// action omits it, and such a reply is still a valid turn.
pub static BASE_OUTPUT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "message": "string",
        "functions?": [{
            "name": "string",
            "args?": "any",
            "results?": "any",
            "status?": "string"
        }]
    })
});

const SCALAR_TYPES: [&str; 7] = [
    "string", "number", "integer", "boolean", "object", "array", "null",
];

/// Options of a validation run
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Accept a null candidate
    pub optional: bool,
    /// Prefix of error messages, e.g. "response"
    pub path: Option<String>,
    /// Reject properties the schema does not declare
    pub reject_extra_properties: bool,
}

/// Validates candidates against a shorthand schema
pub trait OutputValidator: Send + Sync {
    /// # Errors
    /// * `Error::Validation` - the candidate does not match, or the schema is malformed
    fn validate(&self, schema: &Value, candidate: &Value, options: &ValidateOptions) -> Result<()>;
}

/// `jsonschema` backed validator
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaValidator;

impl OutputValidator for SchemaValidator {
    fn validate(&self, schema: &Value, candidate: &Value, options: &ValidateOptions) -> Result<()> {
        if options.optional && candidate.is_null() {
            return Ok(());
        }
        let json_schema = to_json_schema(schema, options.reject_extra_properties)?;
        let validator = build_validator(&json_schema)?;

        let errors: Vec<String> = validator
            .iter_errors(candidate)
            .map(|e| {
                let at = e.instance_path.to_string();
                if at.is_empty() {
                    e.to_string()
                } else {
                    format!("{} (at {})", e, at)
                }
            })
            .collect();

        if errors.is_empty() {
            return Ok(());
        }
        let prefix = options.path.as_deref().unwrap_or("value");
        Err(Error::Validation(format!("{}: {}", prefix, errors.join("; "))))
    }
}

/// Compiles a JSON Schema
pub fn build_validator(schema: &Value) -> Result<jsonschema::Validator> {
    jsonschema::validator_for(schema).map_err(|e| Error::Validation(format!("invalid schema: {}", e)))
}

/// Expands a shorthand schema into JSON Schema
pub fn to_json_schema(short: &Value, reject_extra_properties: bool) -> Result<Value> {
    match short {
        Value::Null | Value::Bool(true) => Ok(json!({})),
        Value::String(kind) => match kind.as_str() {
            "any" => Ok(json!({})),
            k if SCALAR_TYPES.contains(&k) => Ok(json!({ "type": k })),
            other => Err(Error::Validation(format!("unknown schema type '{}'", other))),
        },
        Value::Array(items) => match items.as_slice() {
            [] => Ok(json!({ "type": "array" })),
            [item] => Ok(json!({
                "type": "array",
                "items": to_json_schema(item, reject_extra_properties)?
            })),
            _ => Err(Error::Validation(
                "array shorthand takes exactly one item schema".to_string(),
            )),
        },
        Value::Object(fields) => {
            let mut properties = Map::new();
            let mut required = Vec::new();
            for (key, value) in fields {
                let (name, optional) = split_key(key);
                if !optional {
                    required.push(Value::String(name.to_string()));
                }
                properties.insert(name.to_string(), to_json_schema(value, reject_extra_properties)?);
            }
            let mut schema = json!({
                "type": "object",
                "properties": properties,
                "required": required,
            });
            if reject_extra_properties {
                schema["additionalProperties"] = Value::Bool(false);
            }
            Ok(schema)
        }
        other => Err(Error::Validation(format!("unsupported schema shorthand: {}", other))),
    }
}

/// Merges a caller schema into a base schema, field by field
///
/// Fields only present in the override are added, shared fields are merged
/// recursively, and a field required by the base stays required. An override
/// may only narrow what the base declares: a shorthand that contradicts the
/// base type is ignored and the base is kept.
pub fn merge_schemas(base: &Value, override_schema: &Value) -> Value {
    match (base, override_schema) {
        (Value::Object(base_fields), Value::Object(override_fields)) => {
            let mut merged = base_fields.clone();
            for (key, value) in override_fields {
                let (name, override_optional) = split_key(key);
                let existing = [name.to_string(), format!("{}?", name)]
                    .into_iter()
                    .find(|k| merged.contains_key(k));
                match existing {
                    Some(base_key) => {
                        let base_value = merged.remove(&base_key).unwrap_or(Value::Null);
                        let (_, base_optional) = split_key(&base_key);
                        let merged_key = if base_optional && override_optional {
                            format!("{}?", name)
                        } else {
                            name.to_string()
                        };
                        merged.insert(merged_key, merge_schemas(&base_value, value));
                    }
                    None => {
                        merged.insert(key.clone(), value.clone());
                    }
                }
            }
            Value::Object(merged)
        }
        (Value::Array(base_items), Value::Array(override_items)) => {
            match (base_items.first(), override_items.first()) {
                (Some(b), Some(o)) => Value::Array(vec![merge_schemas(b, o)]),
                (Some(b), None) => Value::Array(vec![b.clone()]),
                (None, _) => override_schema.clone(),
            }
        }
        _ if narrows(base, override_schema) => override_schema.clone(),
        _ => {
            warn!(
                "Output schema override {} conflicts with {}, keeping the base",
                override_schema, base
            );
            base.clone()
        }
    }
}

/// Whether `candidate` accepts a subset of what `base` accepts
fn narrows(base: &Value, candidate: &Value) -> bool {
    match (base, candidate) {
        (Value::Null, _) | (Value::Bool(true), _) => true,
        (Value::String(b), _) if b == "any" => true,
        (Value::String(b), Value::String(c)) => b == c || (b == "number" && c == "integer"),
        (Value::String(b), Value::Object(_)) => b == "object",
        (Value::String(b), Value::Array(_)) => b == "array",
        _ => false,
    }
}

/// Output schema of a turn
pub fn output_schema(override_schema: Option<&Value>, override_base: bool) -> Value {
    match override_schema {
        Some(schema) if override_base => schema.clone(),
        Some(schema) => merge_schemas(&BASE_OUTPUT_SCHEMA, schema),
        None => BASE_OUTPUT_SCHEMA.clone(),
    }
}

fn split_key(key: &str) -> (&str, bool) {
    match key.strip_suffix('?') {
        Some(name) => (name, true),
        None => (key, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(schema: &Value, candidate: Value) -> Result<()> {
        SchemaValidator.validate(schema, &candidate, &ValidateOptions::default())
    }

    #[test]
    fn base_schema_accepts_agent_response() {
        let schema = output_schema(None, false);
        check(
            &schema,
            json!({"message": "hi", "functions": [{"name": "submit", "args": {"a": 1}, "status": "completed"}]}),
        )
        .unwrap();
        check(&schema, json!({"message": "no functions"})).unwrap();
    }

    #[test]
    fn base_schema_requires_message_and_function_name() {
        let schema = output_schema(None, false);
        assert!(check(&schema, json!({"functions": []})).is_err());
        assert!(check(&schema, json!({"message": "x", "functions": [{"args": {}}]})).is_err());
        assert!(check(&schema, json!({"message": 3})).is_err());
    }

    #[test]
    fn override_extends_without_dropping_requirements() {
        let schema = output_schema(Some(&json!({"message?": "string", "mood": "string"})), false);
        assert!(check(&schema, json!({"mood": "happy"})).is_err());
        assert!(check(&schema, json!({"message": "x"})).is_err());
        check(&schema, json!({"message": "x", "mood": "happy"}).clone()).unwrap();
    }

    #[test]
    fn override_refines_nested_items() {
        let schema = merge_schemas(
            &BASE_OUTPUT_SCHEMA,
            &json!({"functions?": [{"status": "string"}]}),
        );
        assert_eq!(schema["functions?"][0]["status"], "string");
        assert_eq!(schema["functions?"][0]["name"], "string");
    }

    #[test]
    fn scalar_override_cannot_erase_function_items() {
        let schema = output_schema(Some(&json!({"functions": "string"})), false);
        assert_eq!(schema["functions"][0]["name"], "string");
        assert!(check(&schema, json!({"message": "hi", "functions": "whatever"})).is_err());
        assert!(check(&schema, json!({"message": "hi"})).is_err());
        check(&schema, json!({"message": "hi", "functions": [{"name": "submit"}]})).unwrap();
    }

    #[test]
    fn conflicting_scalar_override_keeps_base_type() {
        let schema = output_schema(Some(&json!({"message": "number"})), false);
        assert_eq!(schema["message"], "string");
        check(&schema, json!({"message": "hi"})).unwrap();
        assert!(check(&schema, json!({"message": 3})).is_err());
    }

    #[test]
    fn compatible_scalar_override_narrows() {
        assert_eq!(merge_schemas(&json!("number"), &json!("integer")), json!("integer"));
        assert_eq!(merge_schemas(&json!("any"), &json!({"a": "string"})), json!({"a": "string"}));
        assert_eq!(merge_schemas(&json!("integer"), &json!("number")), json!("integer"));
    }

    #[test]
    fn override_base_replaces_schema() {
        let schema = output_schema(Some(&json!({"answer": "number"})), true);
        check(&schema, json!({"answer": 4})).unwrap();
    }

    #[test]
    fn rejects_extra_properties_when_asked() {
        let options = ValidateOptions {
            reject_extra_properties: true,
            path: Some("response".into()),
            ..Default::default()
        };
        let err = SchemaValidator
            .validate(&json!({"message": "string"}), &json!({"message": "x", "extra": 1}), &options)
            .unwrap_err();
        assert!(err.to_string().contains("response"));
    }

    #[test]
    fn optional_accepts_null() {
        let options = ValidateOptions {
            optional: true,
            ..Default::default()
        };
        SchemaValidator
            .validate(&json!({"message": "string"}), &Value::Null, &options)
            .unwrap();
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(to_json_schema(&json!({"a": "strnig"}), false).is_err());
    }
}
