use crate::errors::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Handler linked into the binary and addressed as `native:<name>`
#[async_trait]
pub trait NativeAction: Send + Sync {
    async fn call(&self, args: Value) -> Result<Value>;
}

/// `native:echo` returns its arguments unchanged
#[derive(Debug, Default)]
pub struct EchoAction;

#[async_trait]
impl NativeAction for EchoAction {
    async fn call(&self, args: Value) -> Result<Value> {
        Ok(args)
    }
}

/// `native:clock` returns the current UTC time
#[derive(Debug, Default)]
pub struct ClockAction;

#[async_trait]
impl NativeAction for ClockAction {
    async fn call(&self, _args: Value) -> Result<Value> {
        Ok(json!({ "now": crate::utils::now_rfc3339() }))
    }
}
