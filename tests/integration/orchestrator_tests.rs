/*!
 * Orchestrator behaviour against scripted providers
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use doctrans::errors::TranslationError;
use doctrans::providers::mock::{MOCK_PREFIX, MockBehavior, MockFailure, MockProvider};
use doctrans::translation::unit::reassemble;
use doctrans::translation::{
    BatchOrchestrator, JobParams, JobStatus, Location, NoopProgress, ProgressPolicy, ProgressSink,
    RetryPolicy, TranslationJob, UnitBuilder, UnitStatus,
};

/// Sink remembering every reported value
#[derive(Default)]
struct RecordingSink {
    values: Mutex<Vec<f64>>,
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn report(&self, progress: f64) -> anyhow::Result<()> {
        self.values.lock().push(progress);
        Ok(())
    }
}

fn params(threads: usize) -> JobParams {
    JobParams {
        primary_model: "primary".to_string(),
        fallback_model: Some("backup".to_string()),
        target_language: "English".to_string(),
        glossary: Vec::new(),
        threads,
        prompt: "Translate into {target_lang}:".to_string(),
        extension: "txt".to_string(),
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        retry_delay: Duration::from_millis(1),
        rate_limit_multiplier: 1,
    }
}

fn job_from_blocks(blocks: &[&str], max_chunk_size: usize, threads: usize) -> TranslationJob {
    let mut builder = UnitBuilder::new(max_chunk_size);
    for (index, text) in blocks.iter().enumerate() {
        builder.push_block(text, Location::Block { index }, None);
    }
    TranslationJob::new(builder.finish(), params(threads))
}

fn orchestrator(provider: MockProvider) -> BatchOrchestrator {
    BatchOrchestrator::new(Arc::new(provider)).with_retry_policy(fast_retry())
}

#[tokio::test]
async fn test_run_withJitteredCompletions_shouldReassembleFragmentsInOrder() {
    let long_a = "Alpha sentence one. Bravo sentence two. Charlie sentence three. Delta sentence four.";
    let long_b = "Echo goes first here. Foxtrot follows after. Golf closes the block.";
    let mut job = job_from_blocks(&[long_a, "Short block in between.", long_b], 25, 8);
    assert!(job.units.iter().filter(|u| u.is_fragment()).count() >= 6);

    let report = orchestrator(MockProvider::new(MockBehavior::Jittered { max_delay_ms: 30 }))
        .run(&mut job, Arc::new(NoopProgress))
        .await
        .unwrap();
    assert_eq!(report.translated, job.units.len());

    let blocks = reassemble(&job.units);
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0].original, long_a);
    assert_eq!(blocks[2].original, long_b);
    for block in &blocks {
        let expected: String = block
            .fragments
            .iter()
            .map(|(original, _)| format!("{}{}", MOCK_PREFIX, original))
            .collect();
        assert_eq!(block.translated, expected);
    }
}

#[tokio::test]
async fn test_run_withPrimaryRateLimited_shouldUseFallbackResponse() {
    let provider = MockProvider::working().with_model("primary", MockBehavior::Failing(MockFailure::RateLimit));
    let probe = provider.clone();
    let mut job = job_from_blocks(&["Quarterly revenue grew."], 100, 2);

    let report = orchestrator(provider)
        .run(&mut job, Arc::new(NoopProgress))
        .await
        .unwrap();

    assert_eq!(report.fallback_used, 1);
    assert_eq!(probe.model_request_count("primary"), 3);
    assert_eq!(probe.model_request_count("backup"), 1);
    assert_eq!(
        job.units[0].translated_text.as_deref(),
        Some("[TRANSLATED] Quarterly revenue grew.")
    );
    assert_eq!(job.units[0].status, UnitStatus::Complete);
}

#[tokio::test]
async fn test_run_withAuthenticationError_shouldStopDispatching() {
    let provider = MockProvider::failing(MockFailure::Authentication);
    let probe = provider.clone();
    let blocks = ["One block.", "Two block.", "Three block.", "Four block.", "Five block."];
    let mut job = job_from_blocks(&blocks, 100, 1);

    let error = orchestrator(provider)
        .run(&mut job, Arc::new(NoopProgress))
        .await
        .unwrap_err();

    assert!(matches!(error, TranslationError::Authentication(_)));
    assert_eq!(probe.request_count(), 1);
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.failure_reason.as_deref().is_some_and(|r| !r.is_empty()));
}

#[tokio::test]
async fn test_run_withoutFallbackSupport_shouldExhaustPrimaryOnly() {
    let provider = MockProvider::failing(MockFailure::Connection).without_fallback();
    let probe = provider.clone();
    let mut job = job_from_blocks(&["Machine translated text."], 100, 1);

    let error = orchestrator(provider)
        .run(&mut job, Arc::new(NoopProgress))
        .await
        .unwrap_err();

    assert!(matches!(error, TranslationError::ModelsExhausted(_)));
    assert_eq!(probe.model_request_count("primary"), 3);
    assert_eq!(probe.model_request_count("backup"), 0);
}

#[tokio::test]
async fn test_run_withPanickingProvider_shouldKeepOriginalText() {
    let mut job = job_from_blocks(&["Keep me as I am.", "Me too please."], 100, 2);

    let report = orchestrator(MockProvider::new(MockBehavior::Panicking))
        .run(&mut job, Arc::new(NoopProgress))
        .await
        .unwrap();

    assert_eq!(report.degraded, 2);
    for unit in &job.units {
        assert_eq!(unit.translated_text.as_deref(), Some(unit.original_text.as_str()));
        assert_eq!(unit.status, UnitStatus::Complete);
    }
}

#[tokio::test]
async fn test_run_withRefusalThenSuccess_shouldRetryInvalidAnswers() {
    let provider = MockProvider::new(MockBehavior::Refusing).with_model("backup", MockBehavior::Working);
    let probe = provider.clone();
    let mut job = job_from_blocks(&["Please translate this."], 100, 1);

    orchestrator(provider)
        .run(&mut job, Arc::new(NoopProgress))
        .await
        .unwrap();

    assert_eq!(probe.model_request_count("primary"), 3);
    assert_eq!(
        job.units[0].translated_text.as_deref(),
        Some("[TRANSLATED] Please translate this.")
    );
}

#[tokio::test]
async fn test_run_withManyUnits_shouldReportMonotonicProgressUpTo100() {
    let blocks: Vec<String> = (0..12).map(|i| format!("Paragraph number {} of the report.", i)).collect();
    let blocks: Vec<&str> = blocks.iter().map(String::as_str).collect();
    let mut job = job_from_blocks(&blocks, 100, 4);
    let sink = Arc::new(RecordingSink::default());

    orchestrator(MockProvider::new(MockBehavior::Jittered { max_delay_ms: 15 }))
        .with_progress_policy(ProgressPolicy {
            step: 15.0,
            tail_start: 90.0,
            tail_step: 10.0,
        })
        .run(&mut job, sink.clone())
        .await
        .unwrap();

    let values = sink.values.lock().clone();
    assert!(!values.is_empty());
    assert!(values.windows(2).all(|w| w[0] <= w[1]), "{:?}", values);
    assert_eq!(values.last().copied(), Some(100.0));
    assert_eq!(job.progress, 100.0);
}

#[tokio::test]
async fn test_run_withGlossaryMatch_shouldSendTermsInInstruction() {
    let provider = MockProvider::working();
    let probe = provider.clone();
    let mut job = job_from_blocks(&["Call the API now", "Visit the apiary"], 100, 1);
    job.params.glossary = doctrans::translation::terms::parse_glossary("API,接口");

    orchestrator(provider)
        .run(&mut job, Arc::new(NoopProgress))
        .await
        .unwrap();

    let calls = probe.calls();
    let api_call = calls.iter().find(|c| c.text == "Call the API now").unwrap();
    assert!(api_call.instruction.lines().any(|l| l == "API → 接口"));
    assert!(api_call.instruction.ends_with("Translate into English:"));
    let apiary_call = calls.iter().find(|c| c.text == "Visit the apiary").unwrap();
    assert!(!apiary_call.instruction.contains("接口"));
}
