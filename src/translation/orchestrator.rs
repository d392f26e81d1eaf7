/*!
 * Batch translation orchestrator.
 *
 * Translates every pending unit of a job with bounded parallelism. Each unit
 * gets a retry budget on the primary model, then on the fallback model.
 * Authentication failures cancel the whole job; a panic while processing a
 * single unit degrades that unit to its original text.
 */

use futures::FutureExt;
use futures::stream::{self, StreamExt};
use log::{error, info, warn};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use crate::errors::{ErrorCategory, TranslationError};
use crate::providers::{Provider, TranslateRequest};

use super::progress::{ProgressPolicy, ProgressSink, ProgressTracker, percent};
use super::response::{is_valid_translation, strip_think_tags};
use super::terms::{build_instruction, render_prompt};
use super::unit::{JobParams, JobStatus, TranslationJob, UnitStatus};

/// Smallest and largest worker pool
pub const MIN_THREADS: usize = 1;
pub const MAX_THREADS: usize = 10;
/// Pool size when the task does not specify a usable value
pub const DEFAULT_THREADS: usize = 5;

/// Clamp a requested thread count into the supported range
pub fn clamp_threads(requested: i64) -> usize {
    requested.clamp(MIN_THREADS as i64, MAX_THREADS as i64) as usize
}

/// Parse a thread count coming from a task record
pub fn parse_threads(raw: Option<&str>) -> usize {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .map(clamp_threads)
        .unwrap_or(DEFAULT_THREADS)
}

/// Attempt budget and backoff for provider calls
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per model
    pub max_retries: u32,
    /// Base delay between attempts
    pub retry_delay: Duration,
    /// Rate limits sleep `retry_delay * attempt * multiplier`
    pub rate_limit_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            rate_limit_multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt after a failure of the given category
    pub fn backoff(&self, category: ErrorCategory, attempt: u32) -> Duration {
        match category {
            ErrorCategory::RateLimit => self.retry_delay * attempt * self.rate_limit_multiplier,
            _ => self.retry_delay,
        }
    }
}

/// Result of processing one unit that did not abort the job
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    /// Provider produced a usable translation
    Translated { text: String, used_fallback: bool },
    /// Processing broke unexpectedly; the original text is kept
    Degraded { reason: String },
}

/// Counters of one orchestrator run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct OrchestratorReport {
    pub translated: usize,
    pub degraded: usize,
    pub fallback_used: usize,
    pub skipped: usize,
    pub not_started: usize,
    pub elapsed: Duration,
}

enum ModelFailure {
    Fatal(TranslationError),
    Exhausted(String),
}

enum UnitResult {
    Finished(UnitOutcome),
    Fatal(TranslationError),
    NotStarted,
}

/// Drives provider calls for all units of a job
pub struct BatchOrchestrator {
    provider: Arc<dyn Provider>,
    retry: RetryPolicy,
    progress: ProgressPolicy,
    cancel: Arc<AtomicBool>,
}

impl BatchOrchestrator {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            retry: RetryPolicy::default(),
            progress: ProgressPolicy::default(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_progress_policy(mut self, progress: ProgressPolicy) -> Self {
        self.progress = progress;
        self
    }

    /// Share a cancellation flag with the caller
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Translate every pending unit of `job` in place.
    ///
    /// On a fatal error the job is marked failed, already translated units are
    /// kept for diagnostics, and the error is returned.
    pub async fn run(
        &self,
        job: &mut TranslationJob,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<OrchestratorReport, TranslationError> {
        let started = Instant::now();
        let threads = clamp_threads(job.params.threads as i64);
        let params = Arc::new(job.params.clone());

        let pending: Vec<(usize, String)> = job
            .units
            .iter()
            .enumerate()
            .filter(|(_, unit)| unit.needs_translation())
            .map(|(idx, unit)| (idx, unit.original_text.clone()))
            .collect();

        let mut report = OrchestratorReport {
            skipped: job
                .units
                .iter()
                .filter(|u| u.status == UnitStatus::Skipped)
                .count(),
            ..Default::default()
        };

        info!(
            "Translating {} units ({} skipped) with {} threads via {}",
            pending.len(),
            report.skipped,
            threads,
            self.provider.name()
        );

        let total = pending.len();
        let tracker = Arc::new(ProgressTracker::new(total, self.progress, sink));
        let semaphore = Arc::new(Semaphore::new(threads));

        let results = stream::iter(pending)
            .map(|(idx, text)| {
                let semaphore = semaphore.clone();
                let tracker = tracker.clone();
                let params = params.clone();

                async move {
                    let Ok(_permit) = semaphore.acquire().await else {
                        return (idx, UnitResult::NotStarted);
                    };
                    if self.is_cancelled() {
                        return (idx, UnitResult::NotStarted);
                    }

                    let result = self.process_unit(&text, &params).await;
                    if let UnitResult::Finished(_) = result {
                        tracker.unit_completed().await;
                    }
                    (idx, result)
                }
            })
            .buffer_unordered(threads)
            .collect::<Vec<_>>()
            .await;

        let mut sorted_results = results;
        sorted_results.sort_by_key(|(idx, _)| *idx);

        let mut fatal: Vec<TranslationError> = Vec::new();
        for (idx, result) in sorted_results {
            let unit = &mut job.units[idx];
            match result {
                UnitResult::Finished(UnitOutcome::Translated {
                    text,
                    used_fallback,
                }) => {
                    unit.translated_text = Some(text);
                    unit.status = UnitStatus::Complete;
                    report.translated += 1;
                    if used_fallback {
                        report.fallback_used += 1;
                    }
                }
                UnitResult::Finished(UnitOutcome::Degraded { reason }) => {
                    warn!("Unit {} kept its original text: {}", unit.id, reason);
                    unit.translated_text = Some(unit.original_text.clone());
                    unit.status = UnitStatus::Complete;
                    report.degraded += 1;
                }
                UnitResult::Fatal(e) => fatal.push(e),
                UnitResult::NotStarted => report.not_started += 1,
            }
        }

        report.elapsed = started.elapsed();
        job.progress = percent(tracker.completed().await, total);

        if !fatal.is_empty() {
            // Cancelled units only echo the error that triggered the cancellation
            let primary = fatal
                .iter()
                .position(|e| !matches!(e, TranslationError::Cancelled))
                .unwrap_or(0);
            let error = fatal.swap_remove(primary);
            error!("Translation job aborted: {}", error);
            job.status = JobStatus::Failed;
            job.failure_reason = Some(error.to_string());
            return Err(error);
        }

        info!(
            "Translated {} units ({} degraded, {} via fallback) in {:?}",
            report.translated, report.degraded, report.fallback_used, report.elapsed
        );
        Ok(report)
    }

    async fn process_unit(&self, text: &str, params: &JobParams) -> UnitResult {
        let attempt = AssertUnwindSafe(self.translate_text(text, params))
            .catch_unwind()
            .await;
        match attempt {
            Ok(Ok(outcome)) => UnitResult::Finished(outcome),
            Ok(Err(e)) => {
                if !matches!(e, TranslationError::Cancelled) {
                    self.cancel.store(true, Ordering::SeqCst);
                }
                UnitResult::Fatal(e)
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<String>()
                    .cloned()
                    .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
                    .unwrap_or_else(|| "unexpected failure".to_string());
                UnitResult::Finished(UnitOutcome::Degraded { reason })
            }
        }
    }

    /// Primary model first, then the fallback model after one backoff interval
    async fn translate_text(
        &self,
        text: &str,
        params: &JobParams,
    ) -> Result<UnitOutcome, TranslationError> {
        let instruction = render_prompt(
            &build_instruction(&params.prompt, text, &params.glossary),
            &params.target_language,
        );
        let mut request = TranslateRequest {
            text: text.to_string(),
            target_language: params.target_language.clone(),
            model: params.primary_model.clone(),
            instruction,
            extension: params.extension.clone(),
        };

        let primary_error = match self.attempt_model(&request).await {
            Ok(text) => {
                return Ok(UnitOutcome::Translated {
                    text,
                    used_fallback: false,
                });
            }
            Err(ModelFailure::Fatal(e)) => return Err(e),
            Err(ModelFailure::Exhausted(last)) => last,
        };

        let fallback = params
            .fallback_model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty() && self.provider.supports_fallback());
        let Some(fallback) = fallback else {
            return Err(TranslationError::ModelsExhausted(primary_error));
        };

        warn!(
            "Model {} exhausted its retries, switching to fallback model {}",
            request.model, fallback
        );
        tokio::time::sleep(self.retry.retry_delay).await;
        request.model = fallback.to_string();

        match self.attempt_model(&request).await {
            Ok(text) => Ok(UnitOutcome::Translated {
                text,
                used_fallback: true,
            }),
            Err(ModelFailure::Fatal(e)) => Err(e),
            Err(ModelFailure::Exhausted(last)) => Err(TranslationError::ModelsExhausted(
                format!("{}; fallback: {}", primary_error, last),
            )),
        }
    }

    async fn attempt_model(&self, request: &TranslateRequest) -> Result<String, ModelFailure> {
        let max_retries = self.retry.max_retries.max(1);
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=max_retries {
            if self.is_cancelled() {
                return Err(ModelFailure::Fatal(TranslationError::Cancelled));
            }

            let delay = match self.provider.translate(request).await {
                Ok(raw) => {
                    let text = strip_think_tags(&raw);
                    if is_valid_translation(&text) {
                        return Ok(text);
                    }
                    let preview: String = text.chars().take(50).collect();
                    warn!(
                        "Model {} returned an invalid translation (attempt {}/{}): {:?}",
                        request.model, attempt, max_retries, preview
                    );
                    last_error = format!("invalid response: {:?}", preview);
                    self.retry.retry_delay
                }
                Err(e) => {
                    let category = e.category();
                    if category == ErrorCategory::Authentication {
                        error!("Authentication failed for model {}: {}", request.model, e);
                        self.cancel.store(true, Ordering::SeqCst);
                        return Err(ModelFailure::Fatal(TranslationError::Authentication(
                            e.to_string(),
                        )));
                    }
                    warn!(
                        "Model {} attempt {}/{} failed ({:?}): {}",
                        request.model, attempt, max_retries, category, e
                    );
                    last_error = e.to_string();
                    self.retry.backoff(category, attempt)
                }
            };

            if attempt < max_retries {
                tokio::time::sleep(delay).await;
            }
        }

        Err(ModelFailure::Exhausted(last_error))
    }
}
