use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::Config;
use crate::file_utils::FileManager;
use crate::job::{JobRunner, JobSummary};
use crate::providers::{self, Provider};
use crate::task::{SqliteTaskStore, TaskConfig, TaskRecord, TaskStore};

// @module: Application controller for document translation

/// Outcome counters of a folder run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FolderSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Task store decorator that mirrors progress writes onto a progress bar
struct ProgressBarStore {
    inner: Arc<dyn TaskStore>,
    bar: ProgressBar,
}

#[async_trait]
impl TaskStore for ProgressBarStore {
    async fn load(&self, id: i64) -> Result<TaskConfig> {
        self.inner.load(id).await
    }

    async fn mark_started(&self, id: i64) -> Result<()> {
        self.bar.set_position(0);
        self.bar.set_message("translating");
        self.inner.mark_started(id).await
    }

    async fn update_progress(&self, id: i64, progress: f64) -> Result<()> {
        self.bar.set_position(progress.round() as u64);
        self.inner.update_progress(id, progress).await
    }

    async fn mark_done(&self, id: i64, word_count: usize, target_filesize: u64) -> Result<()> {
        self.bar.set_position(100);
        self.inner.mark_done(id, word_count, target_filesize).await
    }

    async fn mark_failed(&self, id: i64, reason: &str) -> Result<()> {
        self.bar.abandon_with_message("failed");
        self.inner.mark_failed(id, reason).await
    }
}

/// Main application controller for document translation
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Task records
    store: Arc<SqliteTaskStore>,
    // @field: Provider used instead of the configured one
    provider: Option<Arc<dyn Provider>>,
}

impl Controller {
    // @method: Create a controller backed by the configured task database
    pub fn with_config(config: Config) -> Result<Self> {
        let store = SqliteTaskStore::open(config.database_path.as_deref())
            .context("Failed to open task database")?;
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: SqliteTaskStore) -> Self {
        Self {
            config,
            store: Arc::new(store),
            provider: None,
        }
    }

    /// Translate with this provider instead of the configured one
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &SqliteTaskStore {
        &self.store
    }

    /// Translate one document into `output_dir`.
    ///
    /// Returns `None` when the output exists and `force_overwrite` is off.
    pub async fn run(
        &self,
        input_file: PathBuf,
        output_dir: PathBuf,
        force_overwrite: bool,
    ) -> Result<Option<JobSummary>> {
        let multi_progress = MultiProgress::new();
        self.run_with_progress(&input_file, &output_dir, &multi_progress, force_overwrite)
            .await
    }

    async fn run_with_progress(
        &self,
        input_file: &Path,
        output_dir: &Path,
        multi_progress: &MultiProgress,
        force_overwrite: bool,
    ) -> Result<Option<JobSummary>> {
        if !FileManager::file_exists(input_file) {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }

        let output_path =
            FileManager::generate_output_path(input_file, output_dir, &self.config.target_language);
        if output_path.exists() && !force_overwrite {
            warn!(
                "Skipping {:?}, translation already exists (use -f to force overwrite)",
                input_file
            );
            return Ok(None);
        }

        let task = self.config.task_for(input_file, &output_path);
        let task_id = self.store.create_task(&task).await?;
        self.run_task_with_progress(task_id, multi_progress).await.map(Some)
    }

    /// Run a stored task
    pub async fn run_task(&self, task_id: i64) -> Result<JobSummary> {
        let multi_progress = MultiProgress::new();
        self.run_task_with_progress(task_id, &multi_progress).await
    }

    async fn run_task_with_progress(
        &self,
        task_id: i64,
        multi_progress: &MultiProgress,
    ) -> Result<JobSummary> {
        let start_time = std::time::Instant::now();

        let progress_bar = multi_progress.add(ProgressBar::new(100));
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}% {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(template_result.progress_chars("█▓▒░"));
        progress_bar.set_message(format!("task {}", task_id));

        let store: Arc<dyn TaskStore> = Arc::new(ProgressBarStore {
            inner: self.store.clone(),
            bar: progress_bar.clone(),
        });
        let mut runner = JobRunner::new(store).with_settings(self.config.job_settings());
        if let Some(provider) = &self.provider {
            runner = runner.with_provider(Arc::clone(provider));
        }

        let summary = runner.run(task_id).await?;
        progress_bar.finish_with_message("done");

        info!(
            "Success: {} ({} words, {} units, {} degraded) in {}",
            summary.target_path.display(),
            summary.word_count,
            summary.units,
            summary.report.degraded,
            Self::format_duration(start_time.elapsed())
        );
        Ok(summary)
    }

    /// Translate every supported document under `input_dir`.
    ///
    /// Outputs go next to their source unless `output_dir` is given. Files
    /// that look like earlier outputs for the target language are ignored.
    pub async fn run_folder(
        &self,
        input_dir: PathBuf,
        output_dir: Option<PathBuf>,
        force_overwrite: bool,
    ) -> Result<FolderSummary> {
        let start_time = std::time::Instant::now();

        if !FileManager::dir_exists(&input_dir) {
            return Err(anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let documents: Vec<PathBuf> = FileManager::find_documents(&input_dir)?
            .into_iter()
            .filter(|p| !FileManager::is_translated_output(p, &self.config.target_language))
            .collect();

        if documents.is_empty() {
            return Err(anyhow!("No supported documents found in directory: {:?}", input_dir));
        }

        let multi_progress = MultiProgress::new();
        let folder_pb = multi_progress.add(ProgressBar::new(documents.len() as u64));
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        folder_pb.set_style(template_result.progress_chars("█▓▒░"));
        folder_pb.set_message("Processing files");

        let mut summary = FolderSummary::default();
        for document in &documents {
            let file_name = document
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            folder_pb.set_message(format!("Processing: {}", file_name));

            let target_dir = match (&output_dir, document.parent()) {
                (Some(dir), _) => dir.clone(),
                (None, Some(parent)) => parent.to_path_buf(),
                (None, None) => input_dir.clone(),
            };

            match self
                .run_with_progress(document, &target_dir, &multi_progress, force_overwrite)
                .await
            {
                Ok(Some(_)) => summary.processed += 1,
                Ok(None) => summary.skipped += 1,
                Err(e) => {
                    error!("Error processing file {}: {}", file_name, e);
                    summary.failed += 1;
                }
            }
            folder_pb.inc(1);
        }

        folder_pb.finish_with_message("Folder processing complete");
        info!(
            "Folder processing completed: {} processed, {} skipped, {} errors in {}",
            summary.processed,
            summary.skipped,
            summary.failed,
            Self::format_duration(start_time.elapsed())
        );
        Ok(summary)
    }

    /// Store a task for later execution and return its id
    pub async fn create_task(&self, origin: &Path, target: &Path, glossary: Option<String>) -> Result<i64> {
        let mut task = self.config.task_for(origin, target);
        task.glossary = glossary.unwrap_or_default();
        let id = self.store.create_task(&task).await?;
        info!("Created task {} for {:?}", id, origin);
        Ok(id)
    }

    pub async fn show_task(&self, task_id: i64) -> Result<TaskRecord> {
        self.store
            .get_task(task_id)
            .await?
            .ok_or_else(|| anyhow!("Task {} not found", task_id))
    }

    /// Send a short request with the active provider and model
    pub async fn check_connection(&self) -> Result<()> {
        let task = self.config.task_for(Path::new(""), Path::new(""));
        let provider = match &self.provider {
            Some(provider) => Arc::clone(provider),
            None => {
                let settings = self.config.job_settings();
                providers::from_task(&task, settings.timeout_secs, settings.temperature)?
            }
        };
        provider
            .test_connection(&task.model)
            .await
            .with_context(|| format!("Connection test failed for {}", provider.name()))?;
        info!("Connection to {} ({}) is working", provider.name(), task.model);
        Ok(())
    }

    // Format duration in a human-readable format (HH:MM:SS)
    fn format_duration(duration: std::time::Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
