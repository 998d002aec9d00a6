use super::models::ThreadLogRow;
use super::Database;
use crate::core::{HistoryProvider, ThreadLog};
use crate::errors::Result;
use crate::schema::thread_logs;
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use uuid::Uuid;

/// Conversation turns persisted in the `thread_logs` table
#[derive(Clone, Debug)]
pub struct SqliteHistory {
    db: Database,
}

impl SqliteHistory {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HistoryProvider for SqliteHistory {
    async fn load_thread(&self, ext_id: &str) -> Result<Option<Vec<ThreadLog>>> {
        let mut pooled = self.db.get_conn()?;
        let conn: &mut SqliteConnection = &mut pooled;
        let rows = thread_logs::table
            .filter(thread_logs::ext_id.eq(ext_id))
            .order(thread_logs::created_at.asc())
            .select(ThreadLogRow::as_select())
            .load::<ThreadLogRow>(conn)?;
        if rows.is_empty() {
            return Ok(None);
        }
        rows.into_iter()
            .map(ThreadLogRow::into_log)
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    async fn record_turn(&self, ext_id: &str, log: ThreadLog) -> Result<()> {
        let row = ThreadLogRow {
            id: Uuid::new_v4().to_string(),
            ext_id: ext_id.to_string(),
            input: log.input,
            response: serde_json::to_string(&log.response)?,
            created_at: log.created_at,
        };
        let mut pooled = self.db.get_conn()?;
        let conn: &mut SqliteConnection = &mut pooled;
        diesel::insert_into(thread_logs::table)
            .values(&row)
            .execute(conn)?;
        Ok(())
    }
}
