use super::TaskManager;
use crate::constants::INVALID_RESPONSE;
use crate::core::get_thread_history;
use crate::llm::{ChatMessage, ValidateOptions};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

impl TaskManager {
    /// Rebuilds the conversation from recorded turns
    ///
    /// Recorded responses are validated again so that the delegate only sees
    /// assistant turns matching the current output schema.
    pub(super) async fn rebuild_history(&self, ext_id: &str, schema: &Value) -> Vec<ChatMessage> {
        let Some(logs) = get_thread_history(
            self.ctx.history.as_ref(),
            ext_id,
            &self.ctx.settings.history_query,
        )
        .await
        else {
            return Vec::new();
        };

        let mut messages = Vec::with_capacity(logs.len() * 2);
        for log in logs {
            if let Some(input) = log.input.as_deref().filter(|i| !i.trim().is_empty()) {
                messages.push(ChatMessage::user(input));
            }
            match self.check_response(&log.response, schema) {
                Ok(()) => messages.push(ChatMessage::assistant(&log.response.to_string())),
                Err(reason) => debug!("Dropping recorded turn from history: {}", reason),
            }
        }
        messages
    }

    pub(super) fn check_response(&self, body: &Value, schema: &Value) -> Result<(), String> {
        let options = ValidateOptions {
            path: Some("response".to_string()),
            ..Default::default()
        };
        self.ctx
            .validator
            .validate(schema, body, &options)
            .map_err(|e| e.to_string())
    }

    /// Returns the body unchanged when valid, annotated with an `INVALID_RESPONSE` error otherwise
    ///
    /// The flag tells whether the body passed validation.
    pub(super) fn validate_response(&self, body: Value, schema: &Value) -> (Value, bool) {
        match self.check_response(&body, schema) {
            Ok(()) => (body, true),
            Err(reason) => {
                warn!("Agent response failed validation: {}", reason);
                (degrade(body, reason), false)
            }
        }
    }
}

/// Keeps whatever the delegate produced and attaches the validation error
pub(super) fn degrade(body: Value, reason: String) -> Value {
    let mut fields = match body {
        Value::Object(fields) => fields,
        Value::String(message) => {
            let mut fields = Map::new();
            fields.insert("message".to_string(), Value::String(message));
            fields
        }
        Value::Null => Map::new(),
        other => {
            let mut fields = Map::new();
            fields.insert("raw".to_string(), other);
            fields
        }
    };
    fields.insert(
        "error".to_string(),
        json!({ "code": INVALID_RESPONSE, "message": reason }),
    );
    Value::Object(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degrade_preserves_message_and_functions() {
        let body = degrade(
            json!({"message": 42, "functions": [{"name": "submit"}]}),
            "response: bad".into(),
        );
        assert_eq!(body["message"], 42);
        assert_eq!(body["functions"][0]["name"], "submit");
        assert_eq!(body["error"]["code"], INVALID_RESPONSE);
    }

    #[test]
    fn degrade_wraps_non_objects() {
        assert_eq!(degrade(json!("plain"), "x".into())["message"], "plain");
        assert_eq!(degrade(json!([1]), "x".into())["raw"], json!([1]));
        assert_eq!(degrade(Value::Null, "x".into())["error"]["message"], "x");
    }
}
