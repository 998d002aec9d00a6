use super::models::TaskRow;
use super::Database;
use crate::core::{NewTask, Task, TaskPatch, TaskStatus, TaskStore};
use crate::errors::{Error, Result};
use crate::schema::tasks;
use crate::utils::{next_version, now_rfc3339};
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;
use tracing::{debug, warn};
use uuid::Uuid;

/// Maps a violated uniqueness constraint to a conflict
fn unique_conflict(e: DieselError) -> Error {
    match e {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            Error::Conflict(info.message().to_string())
        }
        other => other.into(),
    }
}

/// Task store persisted in the `tasks` table
#[derive(Clone, Debug)]
pub struct SqliteTaskStore {
    db: Database,
}

impl SqliteTaskStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn load(conn: &mut SqliteConnection, task_id: &str) -> Result<Option<TaskRow>> {
        Ok(tasks::table
            .filter(tasks::id.eq(task_id))
            .select(TaskRow::as_select())
            .first::<TaskRow>(conn)
            .optional()?)
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn find_active(&self, ext_id: &str) -> Result<Option<Task>> {
        let mut pooled = self.db.get_conn()?;
        let conn: &mut SqliteConnection = &mut pooled;
        tasks::table
            .filter(tasks::ext_id.eq(ext_id))
            .filter(tasks::status.eq(TaskStatus::Active.as_str()))
            .order(tasks::updated_at.desc())
            .select(TaskRow::as_select())
            .first::<TaskRow>(conn)
            .optional()?
            .map(TaskRow::into_task)
            .transpose()
    }

    async fn get(&self, id: &str) -> Result<Option<Task>> {
        let mut pooled = self.db.get_conn()?;
        let conn: &mut SqliteConnection = &mut pooled;
        Self::load(conn, id)?.map(TaskRow::into_task).transpose()
    }

    async fn create(&self, new_task: NewTask) -> Result<Task> {
        let task = Task::from_new(Uuid::new_v4().to_string(), new_task, now_rfc3339());
        let row = TaskRow::from_task(&task)?;

        let mut pooled = self.db.get_conn()?;
        let conn: &mut SqliteConnection = &mut pooled;
        conn.transaction::<_, Error, _>(|conn| {
            let active = tasks::table
                .filter(tasks::ext_id.eq(&row.ext_id))
                .filter(tasks::status.eq(TaskStatus::Active.as_str()))
                .select(tasks::id)
                .first::<String>(conn)
                .optional()?;
            if let Some(active_id) = active {
                warn!("Thread {} already has active task {}", row.ext_id, active_id);
                return Err(Error::Conflict(format!(
                    "thread {} already has active task {}",
                    row.ext_id, active_id
                )));
            }
            diesel::insert_into(tasks::table)
                .values(&row)
                .execute(conn)
                .map_err(unique_conflict)?;
            Ok(())
        })?;

        debug!("Inserted task {} for thread {}", task.id, task.ext_id);
        Ok(task)
    }

    async fn update(&self, id: &str, expected_version: &str, patch: &TaskPatch) -> Result<Task> {
        let mut pooled = self.db.get_conn()?;
        let conn: &mut SqliteConnection = &mut pooled;
        conn.transaction::<_, Error, _>(|conn| {
            let mut task = Self::load(conn, id)?
                .ok_or_else(|| Error::Validation(format!("task {} does not exist", id)))?
                .into_task()?;
            if task.updated_at != expected_version {
                return Err(Error::Conflict(format!(
                    "task {} changed since version {}",
                    id, expected_version
                )));
            }

            task.apply_patch(patch)?;
            task.updated_at = next_version(expected_version);
            let row = TaskRow::from_task(&task)?;

            let changed = diesel::update(
                tasks::table
                    .filter(tasks::id.eq(id))
                    .filter(tasks::updated_at.eq(expected_version)),
            )
            .set(&row)
            .execute(conn)
            .map_err(unique_conflict)?;
            if changed == 0 {
                return Err(Error::Conflict(format!("task {} was updated concurrently", id)));
            }

            debug!("Updated task {} to version {}", id, task.updated_at);
            Ok(task)
        })
    }
}
