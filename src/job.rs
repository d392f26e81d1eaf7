/*!
 * Job runner: one task from start to a terminal status.
 *
 * The sequence is load → open → mark started → extract → translate →
 * reinject → write → mark done. Any error along the way, including a panic,
 * ends in `mark_failed`; a task is never left in `process`.
 *
 * Documents that cannot be opened fail before the task is marked started.
 */

use async_trait::async_trait;
use futures::FutureExt;
use log::{error, info};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

use crate::errors::{FormatError, JobError};
use crate::file_utils::FileManager;
use crate::formats::{ChunkLimits, Document, FormatHandler};
use crate::providers::{self, Provider};
use crate::task::TaskStore;
use crate::translation::orchestrator::{BatchOrchestrator, OrchestratorReport, RetryPolicy};
use crate::translation::progress::{ProgressPolicy, ProgressSink};
use crate::translation::terms::parse_glossary;
use crate::translation::unit::{JobParams, TranslationJob};

/// Knobs shared by every job of a runner
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub limits: ChunkLimits,
    pub retry: RetryPolicy,
    pub progress: ProgressPolicy,
    /// Per-request timeout of the provider HTTP client
    pub timeout_secs: u64,
    /// Sampling temperature for chat models
    pub temperature: f32,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            limits: ChunkLimits::default(),
            retry: RetryPolicy::default(),
            progress: ProgressPolicy::default(),
            timeout_secs: 120,
            temperature: 0.7,
        }
    }
}

/// Result of a successful job
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub task_id: i64,
    pub target_path: PathBuf,
    pub units: usize,
    pub word_count: usize,
    pub target_filesize: u64,
    pub report: OrchestratorReport,
}

/// Forwards orchestrator progress to the task record
struct TaskProgress {
    store: Arc<dyn TaskStore>,
    task_id: i64,
}

#[async_trait]
impl ProgressSink for TaskProgress {
    async fn report(&self, progress: f64) -> anyhow::Result<()> {
        self.store.update_progress(self.task_id, progress).await
    }
}

/// Runs tasks against a task store
pub struct JobRunner {
    store: Arc<dyn TaskStore>,
    settings: JobSettings,
    /// Used instead of building one from the task
    provider: Option<Arc<dyn Provider>>,
}

impl JobRunner {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            settings: JobSettings::default(),
            provider: None,
        }
    }

    pub fn with_settings(mut self, settings: JobSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Use this provider for every task instead of the one the task describes
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn settings(&self) -> &JobSettings {
        &self.settings
    }

    /// Start the job in the background and return immediately
    pub fn spawn(self: Arc<Self>, task_id: i64) -> JoinHandle<Result<JobSummary, JobError>> {
        tokio::spawn(async move { self.run(task_id).await })
    }

    /// Run one task to completion; the task always ends `done` or `failed`
    pub async fn run(&self, task_id: i64) -> Result<JobSummary, JobError> {
        let outcome = AssertUnwindSafe(self.execute(task_id)).catch_unwind().await;
        let result = match outcome {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<String>()
                    .cloned()
                    .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
                    .unwrap_or_else(|| "unexpected failure".to_string());
                Err(JobError::Task(format!("job panicked: {}", reason)))
            }
        };

        if let Err(e) = &result {
            error!("Task {} failed: {}", task_id, e);
            if let Err(store_error) = self.store.mark_failed(task_id, &e.to_string()).await {
                error!("Could not record failure of task {}: {}", task_id, store_error);
            }
        }
        result
    }

    async fn execute(&self, task_id: i64) -> Result<JobSummary, JobError> {
        let started = Instant::now();
        let task = self
            .store
            .load(task_id)
            .await
            .map_err(|e| JobError::Task(e.to_string()))?;

        let mut document = Document::open(&task.origin_filepath)?;
        let provider = match &self.provider {
            Some(provider) => Arc::clone(provider),
            None => providers::from_task(&task, self.settings.timeout_secs, self.settings.temperature)
                .map_err(|e| JobError::ProviderSetup(e.to_string()))?,
        };

        self.store
            .mark_started(task_id)
            .await
            .map_err(|e| JobError::Task(e.to_string()))?;
        info!(
            "Task {}: translating {:?} ({}) into {}",
            task_id,
            task.origin_filepath,
            document.kind(),
            task.lang
        );

        let units = document.extract(&self.settings.limits)?;
        let unit_count = units.len();
        let params = JobParams {
            primary_model: task.model.clone(),
            fallback_model: task.fallback_model(),
            target_language: task.lang.clone(),
            glossary: parse_glossary(&task.glossary),
            threads: task.thread_count(),
            prompt: task.prompt.clone(),
            extension: task.extension(),
        };
        let mut job = TranslationJob::new(units, params);

        let sink: Arc<dyn ProgressSink> = Arc::new(TaskProgress {
            store: Arc::clone(&self.store),
            task_id,
        });
        let orchestrator = BatchOrchestrator::new(provider)
            .with_retry_policy(self.settings.retry)
            .with_progress_policy(self.settings.progress);
        let report = orchestrator.run(&mut job, sink).await?;

        document.reinject(&job.units, task.output_mode())?;
        let bytes = document.to_bytes()?;
        let target_filesize = FileManager::write_atomic(&task.target_filepath, &bytes)
            .map_err(|e| FormatError::Io(std::io::Error::other(format!("{:#}", e))))?;

        let word_count = job.word_count();
        self.store
            .mark_done(task_id, word_count, target_filesize)
            .await
            .map_err(|e| JobError::Task(e.to_string()))?;

        info!(
            "Task {} done: {} units, {} words, {} bytes written to {:?} in {:?}",
            task_id,
            unit_count,
            word_count,
            target_filesize,
            task.target_filepath,
            started.elapsed()
        );

        Ok(JobSummary {
            task_id,
            target_path: task.target_filepath.clone(),
            units: unit_count,
            word_count,
            target_filesize,
            report,
        })
    }
}
