//! Core of the task orchestration engine
//!
//! This module contains:
//! - Task records, their status and dotted-path patches
//! - Workflow definitions and the catalog built from configuration
//! - Store and history interfaces consumed by the orchestrator
//! - The task resolver and the orchestrator itself ([`TaskManager`])

mod history;
mod manager;
mod patch;
mod resolver;
mod store;
mod task;
mod task_state;
mod workflow;

pub use history::*;
pub use manager::*;
pub use patch::*;
pub use resolver::*;
pub use store::*;
pub use task::*;
pub use task_state::*;
pub use workflow::*;
