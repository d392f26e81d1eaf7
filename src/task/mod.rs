/*!
 * Task collaborator: where job parameters come from and where job state goes.
 *
 * A job only ever updates the single record it was started for; records are
 * created by the CLI (or by tests), never by the job path.
 *
 * - `models`: task rows and status enums
 * - `schema` / `connection` / `repository`: SQLite implementation
 * - `memory`: in-process implementation that records every write
 */

use anyhow::Result;
use async_trait::async_trait;

pub mod connection;
pub mod memory;
pub mod models;
pub mod repository;
pub mod schema;

pub use connection::DatabaseConnection;
pub use memory::MemoryTaskStore;
pub use models::{ProviderKind, TaskConfig, TaskRecord, TaskStatus};
pub use repository::SqliteTaskStore;

/// Reads task parameters and records job state transitions
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Parameters of one task
    async fn load(&self, id: i64) -> Result<TaskConfig>;

    /// status=process, start_at=now, progress=0
    async fn mark_started(&self, id: i64) -> Result<()>;

    /// Persist progress (0-100)
    async fn update_progress(&self, id: i64, progress: f64) -> Result<()>;

    /// status=done, progress=100, end_at=now
    async fn mark_done(&self, id: i64, word_count: usize, target_filesize: u64) -> Result<()>;

    /// status=failed with a truncated reason; failed_count is incremented
    async fn mark_failed(&self, id: i64, reason: &str) -> Result<()>;
}

/// Timestamp format written to `start_at` / `end_at`
pub fn now_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
