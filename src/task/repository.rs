/*!
 * SQLite backed task store.
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};

use crate::errors::truncate_reason;

use super::connection::DatabaseConnection;
use super::models::{TaskConfig, TaskRecord, TaskStatus};
use super::{TaskStore, now_timestamp};

const SELECT_COLUMNS: &str = r#"
    id, origin_filepath, target_filepath, lang, type, server, model, backup_model,
    api_url, api_key, app_id, app_key, prompt, threads, comparison,
    status, process, start_at, end_at, failed_reason, failed_count,
    word_count, target_filesize, created_at
"#;

/// Task store over the `translate` table
#[derive(Clone)]
pub struct SqliteTaskStore {
    db: DatabaseConnection,
}

impl SqliteTaskStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Open the database at `path`, or at the default location
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let db = match path {
            Some(path) => DatabaseConnection::new(path)?,
            None => DatabaseConnection::new_default()?,
        };
        Ok(Self::new(db))
    }

    /// Store with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_in_memory()?))
    }

    pub fn path(&self) -> &Path {
        self.db.path()
    }

    /// Insert a new task and return its id. `task.id` is ignored.
    pub async fn create_task(&self, task: &TaskConfig) -> Result<i64> {
        let task = task.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO translate (
                        origin_filepath, target_filepath, lang, type, server, model,
                        backup_model, api_url, api_key, app_id, app_key, prompt,
                        threads, comparison, status, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                    "#,
                    params![
                        task.origin_filepath.to_string_lossy(),
                        task.target_filepath.to_string_lossy(),
                        task.lang,
                        task.output_type,
                        task.server.to_string(),
                        task.model,
                        task.backup_model,
                        task.api_url,
                        task.api_key,
                        task.app_id,
                        task.app_key,
                        task.prompt,
                        task.threads,
                        task.glossary,
                        TaskStatus::None.to_string(),
                        now_timestamp(),
                    ],
                )?;
                let id = conn.last_insert_rowid();
                debug!("Created task {}", id);
                Ok(id)
            })
            .await
    }

    /// Full row of one task
    pub async fn get_task(&self, id: i64) -> Result<Option<TaskRecord>> {
        self.db
            .execute_async(move |conn| Self::get_task_sync(conn, id))
            .await
    }

    /// Most recent tasks first
    pub async fn list_tasks(&self, limit: usize) -> Result<Vec<TaskRecord>> {
        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM translate ORDER BY id DESC LIMIT ?1",
                    SELECT_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([limit as i64], Self::row_to_record)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    fn get_task_sync(conn: &Connection, id: i64) -> Result<Option<TaskRecord>> {
        let sql = format!("SELECT {} FROM translate WHERE id = ?1", SELECT_COLUMNS);
        let record = conn
            .query_row(&sql, [id], Self::row_to_record)
            .optional()?;
        Ok(record)
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<TaskRecord> {
        let config = TaskConfig {
            id: row.get(0)?,
            origin_filepath: PathBuf::from(row.get::<_, String>(1)?),
            target_filepath: PathBuf::from(row.get::<_, String>(2)?),
            lang: row.get(3)?,
            output_type: row.get(4)?,
            server: row.get::<_, String>(5)?.parse().unwrap_or_default(),
            model: row.get(6)?,
            backup_model: row.get(7)?,
            api_url: row.get(8)?,
            api_key: row.get(9)?,
            app_id: row.get(10)?,
            app_key: row.get(11)?,
            prompt: row.get(12)?,
            threads: row.get(13)?,
            glossary: row.get(14)?,
        };
        Ok(TaskRecord {
            config,
            status: row.get::<_, String>(15)?.parse().unwrap_or_default(),
            process: row.get(16)?,
            start_at: row.get(17)?,
            end_at: row.get(18)?,
            failed_reason: row.get(19)?,
            failed_count: row.get(20)?,
            word_count: row.get(21)?,
            target_filesize: row.get(22)?,
            created_at: row.get(23)?,
        })
    }

    async fn update<F>(&self, id: i64, f: F) -> Result<()>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<usize> + Send + 'static,
    {
        let changed = self.db.execute_async(move |conn| Ok(f(conn)?)).await?;
        if changed == 0 {
            anyhow::bail!("Task {} not found", id);
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn load(&self, id: i64) -> Result<TaskConfig> {
        let record = self
            .get_task(id)
            .await
            .with_context(|| format!("Failed to load task {}", id))?
            .ok_or_else(|| anyhow::anyhow!("Task {} not found", id))?;
        Ok(record.config)
    }

    async fn mark_started(&self, id: i64) -> Result<()> {
        debug!("Task {} -> process", id);
        self.update(id, move |conn| {
            conn.execute(
                "UPDATE translate SET status = ?1, start_at = ?2, process = 0, failed_reason = NULL WHERE id = ?3",
                params![TaskStatus::Process.to_string(), now_timestamp(), id],
            )
        })
        .await
    }

    async fn update_progress(&self, id: i64, progress: f64) -> Result<()> {
        debug!("Task {} progress {:.1}", id, progress);
        self.update(id, move |conn| {
            conn.execute(
                "UPDATE translate SET process = ?1 WHERE id = ?2",
                params![progress.clamp(0.0, 100.0), id],
            )
        })
        .await
    }

    async fn mark_done(&self, id: i64, word_count: usize, target_filesize: u64) -> Result<()> {
        debug!("Task {} -> done ({} words, {} bytes)", id, word_count, target_filesize);
        self.update(id, move |conn| {
            conn.execute(
                r#"
                UPDATE translate
                SET status = ?1, process = 100, end_at = ?2, word_count = ?3, target_filesize = ?4
                WHERE id = ?5
                "#,
                params![
                    TaskStatus::Done.to_string(),
                    now_timestamp(),
                    word_count as i64,
                    target_filesize as i64,
                    id
                ],
            )
        })
        .await
    }

    async fn mark_failed(&self, id: i64, reason: &str) -> Result<()> {
        let reason = truncate_reason(reason);
        debug!("Task {} -> failed: {}", id, reason);
        self.update(id, move |conn| {
            conn.execute(
                r#"
                UPDATE translate
                SET status = ?1, end_at = ?2, failed_reason = ?3, failed_count = failed_count + 1
                WHERE id = ?4
                "#,
                params![TaskStatus::Failed.to_string(), now_timestamp(), reason, id],
            )
        })
        .await
    }
}
