/*!
 * In-process task store.
 *
 * Keeps every record in a map and remembers each progress write in order, so
 * callers can inspect exactly what a job reported.
 */

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::errors::truncate_reason;

use super::models::{TaskConfig, TaskRecord, TaskStatus};
use super::{TaskStore, now_timestamp};

#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    records: Mutex<HashMap<i64, TaskRecord>>,
    progress_log: Mutex<Vec<(i64, f64)>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a task under `task.id`
    pub fn insert(&self, task: TaskConfig) {
        self.records
            .lock()
            .insert(task.id, TaskRecord::new(task, now_timestamp()));
    }

    pub fn record(&self, id: i64) -> Option<TaskRecord> {
        self.records.lock().get(&id).cloned()
    }

    pub fn status(&self, id: i64) -> Option<TaskStatus> {
        self.records.lock().get(&id).map(|r| r.status)
    }

    /// Every progress value written for `id`, in write order
    pub fn progress_writes(&self, id: i64) -> Vec<f64> {
        self.progress_log
            .lock()
            .iter()
            .filter(|(task, _)| *task == id)
            .map(|(_, value)| *value)
            .collect()
    }

    fn with_record<T>(&self, id: i64, f: impl FnOnce(&mut TaskRecord) -> T) -> Result<T> {
        let mut records = self.records.lock();
        let record = records
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("Task {} not found", id))?;
        Ok(f(record))
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn load(&self, id: i64) -> Result<TaskConfig> {
        self.with_record(id, |r| r.config.clone())
    }

    async fn mark_started(&self, id: i64) -> Result<()> {
        self.with_record(id, |r| {
            r.status = TaskStatus::Process;
            r.start_at = Some(now_timestamp());
            r.process = 0.0;
        })?;
        self.progress_log.lock().push((id, 0.0));
        Ok(())
    }

    async fn update_progress(&self, id: i64, progress: f64) -> Result<()> {
        self.with_record(id, |r| r.process = progress)?;
        self.progress_log.lock().push((id, progress));
        Ok(())
    }

    async fn mark_done(&self, id: i64, word_count: usize, target_filesize: u64) -> Result<()> {
        self.with_record(id, |r| {
            r.status = TaskStatus::Done;
            r.process = 100.0;
            r.end_at = Some(now_timestamp());
            r.word_count = word_count as i64;
            r.target_filesize = target_filesize as i64;
        })?;
        self.progress_log.lock().push((id, 100.0));
        Ok(())
    }

    async fn mark_failed(&self, id: i64, reason: &str) -> Result<()> {
        self.with_record(id, |r| {
            r.status = TaskStatus::Failed;
            r.end_at = Some(now_timestamp());
            r.failed_reason = Some(truncate_reason(reason));
            r.failed_count += 1;
        })
    }
}
