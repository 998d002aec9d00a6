mod history_repository;
mod memory;
mod models;
mod task_repository;

use crate::errors::Result;
use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;
use tracing::info;

pub use history_repository::*;
pub use memory::*;
pub use models::*;
pub use task_repository::*;

/// Tables and indexes created on startup
///
/// The partial unique index allows a single active task per conversation.
pub const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY NOT NULL,
    ext_id TEXT NOT NULL,
    status TEXT NOT NULL,
    workflow TEXT NOT NULL,
    current_step TEXT,
    context TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS tasks_one_active_per_thread
    ON tasks (ext_id) WHERE status = 'active';
CREATE INDEX IF NOT EXISTS tasks_ext_id_updated_at ON tasks (ext_id, updated_at);
CREATE TABLE IF NOT EXISTS thread_logs (
    id TEXT PRIMARY KEY NOT NULL,
    ext_id TEXT NOT NULL,
    input TEXT,
    response TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS thread_logs_ext_id_created_at ON thread_logs (ext_id, created_at);
";

pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Pooled SQLite database
#[derive(Clone, Debug)]
pub struct Database {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
}

impl Database {
    /// Opens (or creates) the database file and makes sure the schema exists
    ///
    /// # Errors
    /// * `Error::PoolError` - the pool cannot be built
    /// * `Error::DieselError` - the schema cannot be created
    pub fn new(db_path: &str) -> Result<Self> {
        let manager = ConnectionManager::<SqliteConnection>::new(db_path);
        let pool = Pool::builder().max_size(4).build(manager)?;
        let database = Database {
            pool: Arc::new(pool),
        };
        database.get_conn()?.batch_execute(SCHEMA_SQL)?;
        info!("Database ready at {}", db_path);
        Ok(database)
    }

    pub fn get_conn(&self) -> Result<DbConnection> {
        Ok(self.pool.get()?)
    }
}
