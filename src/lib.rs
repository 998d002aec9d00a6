//! Conversational task orchestration.
//!
//! A conversation turn is resolved against the active task of its thread, a
//! function-calling delegate acts on it through action modules, and the
//! validated response drives the task from step to step.

pub mod actions;
pub mod agents;
pub mod config;
pub mod constants;
pub mod core;
pub mod db;
pub mod errors;
pub mod event;
pub mod llm;
pub mod prompt;
mod schema;
pub mod utils;

pub use crate::core::{EngineContext, EngineSettings, TaskManager, TurnOptions, TurnRequest, TurnResponse};
pub use crate::errors::{Error, Result};
