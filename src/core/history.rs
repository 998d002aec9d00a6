use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// One externally visible turn of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadLog {
    /// User input of the turn, if any
    pub input: Option<String>,
    /// Response returned to the caller
    pub response: Value,
    pub created_at: String,
}

/// Parameters of a history lookup
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    /// Caller on whose behalf the lookup runs, used for logging
    pub function_name: String,
    /// Total number of attempts
    pub max_retries: usize,
    /// Pause between attempts
    pub retry_delay: Duration,
}

/// Storage of past conversation turns
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Turns of a conversation in chronological order, `None` when unknown
    async fn load_thread(&self, ext_id: &str) -> Result<Option<Vec<ThreadLog>>>;

    async fn record_turn(&self, ext_id: &str, log: ThreadLog) -> Result<()>;
}

/// Fetches thread history with bounded retries
///
/// History is a convenience: once every attempt has failed the turn proceeds
/// without it.
pub async fn get_thread_history(
    provider: &dyn HistoryProvider,
    ext_id: &str,
    query: &HistoryQuery,
) -> Option<Vec<ThreadLog>> {
    let attempts = query.max_retries.max(1);
    for attempt in 1..=attempts {
        match provider.load_thread(ext_id).await {
            Ok(logs) => {
                debug!(
                    "{}: loaded {} history entries for {}",
                    query.function_name,
                    logs.as_ref().map_or(0, |l| l.len()),
                    ext_id
                );
                return logs;
            }
            Err(e) => {
                warn!(
                    "{}: history fetch for {} failed (attempt {}/{}): {}",
                    query.function_name, ext_id, attempt, attempts, e
                );
                if attempt < attempts {
                    tokio::time::sleep(query.retry_delay).await;
                }
            }
        }
    }
    None
}
