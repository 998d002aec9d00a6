mod format_validator;
mod llm_client;
mod message;
pub mod providers;

pub use format_validator::*;
pub use llm_client::*;
pub use message::*;
