use super::task_state::TaskStatus;
use crate::errors::{Error, Result};
use serde_json::{Map, Value};

/// Pending update for a task: ordered dotted-path assignments
///
/// Paths follow the document layout of [`super::Task`], for example
/// `currentStep` or `context.steps.2.submitParams`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    assignments: Vec<(String, Value)>,
}

impl TaskPatch {
    pub fn set(&mut self, path: impl Into<String>, value: Value) {
        self.assignments.push((path.into(), value));
    }

    pub fn set_status(&mut self, status: TaskStatus) {
        self.set("status", Value::String(status.as_str().to_string()));
    }

    pub fn set_current_step(&mut self, step_id: &str) {
        self.set("currentStep", Value::String(step_id.to_string()));
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn assignments(&self) -> impl Iterator<Item = &(String, Value)> {
        self.assignments.iter()
    }

    /// Last value assigned to exactly `path`, if any
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.assignments
            .iter()
            .rev()
            .find(|(p, _)| p == path)
            .map(|(_, v)| v)
    }
}

/// Assigns `value` at a dotted `path` inside `doc`, creating intermediate objects
///
/// Numeric segments index into existing arrays; everywhere else they are
/// treated as object keys.
pub fn set_path(doc: &mut Value, path: &str, value: Value) -> Result<()> {
    if path.is_empty() {
        return Err(Error::Validation("empty patch path".to_string()));
    }

    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| Error::Validation("empty patch path".to_string()))?;

    let mut cursor = doc;
    for segment in parents {
        cursor = child_mut(cursor, segment, path)?;
    }

    match cursor {
        Value::Array(items) => {
            let index = parse_index(last, path)?;
            if index < items.len() {
                items[index] = value;
            } else if index == items.len() {
                items.push(value);
            } else {
                return Err(Error::Validation(format!(
                    "index {} out of bounds in '{}'",
                    index, path
                )));
            }
        }
        other => {
            if !other.is_object() {
                *other = Value::Object(Map::new());
            }
            if let Value::Object(map) = other {
                map.insert(last.to_string(), value);
            }
        }
    }
    Ok(())
}

fn child_mut<'a>(cursor: &'a mut Value, segment: &str, path: &str) -> Result<&'a mut Value> {
    if !cursor.is_object() && !cursor.is_array() {
        *cursor = Value::Object(Map::new());
    }
    match cursor {
        Value::Array(items) => {
            let index = parse_index(segment, path)?;
            items.get_mut(index).ok_or_else(|| {
                Error::Validation(format!("index {} out of bounds in '{}'", index, path))
            })
        }
        Value::Object(map) => Ok(map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()))),
        _ => Err(Error::Validation(format!("cannot descend into '{}'", path))),
    }
}

fn parse_index(segment: &str, path: &str) -> Result<usize> {
    segment
        .parse::<usize>()
        .map_err(|_| Error::Validation(format!("'{}' is not an array index in '{}'", segment, path)))
}
