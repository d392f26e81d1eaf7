/*!
 * Task lifecycle: a stored task goes from source document to output file
 * and always ends `done` or `failed`.
 */

use std::sync::Arc;

use doctrans::errors::JobError;
use doctrans::formats::{ChunkLimits, Document, FormatHandler};
use doctrans::job::JobRunner;
use doctrans::providers::mock::{MockBehavior, MockFailure, MockProvider};
use doctrans::task::{MemoryTaskStore, SqliteTaskStore, TaskStatus, TaskStore};

use crate::common;

fn docx_with(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs.iter().map(|p| common::word_paragraph(&[*p])).collect();
    common::docx_bytes(&body)
}

#[tokio::test]
async fn test_run_withDocx_shouldWriteTranslationAndFinishDone() {
    let dir = common::create_temp_dir().unwrap();
    let origin = common::create_test_file(
        dir.path(),
        "report.docx",
        &docx_with(&["Executive summary", "Page 1", "Revenue grew strongly."]),
    )
    .unwrap();
    let target = dir.path().join("out").join("report.English.docx");

    let store = Arc::new(MemoryTaskStore::new());
    store.insert(common::task(1, &origin, &target));
    let summary = common::runner(store.clone(), Arc::new(MockProvider::working()))
        .run(1)
        .await
        .unwrap();

    let record = store.record(1).unwrap();
    assert_eq!(record.status, TaskStatus::Done);
    assert_eq!(record.process, 100.0);
    assert!(record.word_count > 0);
    assert_eq!(record.target_filesize as u64, std::fs::metadata(&target).unwrap().len());
    assert_eq!(summary.target_filesize, record.target_filesize as u64);

    let translated = Document::open(&target).unwrap();
    let texts: Vec<String> = translated
        .extract(&ChunkLimits::default())
        .unwrap()
        .into_iter()
        .map(|u| u.original_text)
        .collect();
    assert_eq!(
        texts,
        vec![
            "[TRANSLATED] Executive summary",
            "Page 1",
            "[TRANSLATED] Revenue grew strongly."
        ]
    );
}

#[tokio::test]
async fn test_run_withManyParagraphs_shouldPersistMonotonicProgress() {
    let dir = common::create_temp_dir().unwrap();
    let text: Vec<String> = (0..20).map(|i| format!("Paragraph {} talks about the plan.", i)).collect();
    let origin = common::create_test_file(dir.path(), "notes.txt", text.join("\n\n").as_bytes()).unwrap();
    let target = dir.path().join("notes.English.txt");

    let store = Arc::new(MemoryTaskStore::new());
    store.insert(common::task(7, &origin, &target));
    common::runner(
        store.clone(),
        Arc::new(MockProvider::new(MockBehavior::Jittered { max_delay_ms: 10 })),
    )
    .run(7)
    .await
    .unwrap();

    let writes = store.progress_writes(7);
    assert_eq!(writes.first().copied(), Some(0.0));
    assert_eq!(writes.last().copied(), Some(100.0));
    assert!(writes.windows(2).all(|w| w[0] <= w[1]), "{:?}", writes);
}

#[tokio::test]
async fn test_run_withPrimaryRateLimited_shouldFinishDoneWithFallbackText() {
    let dir = common::create_temp_dir().unwrap();
    let origin = common::create_test_file(dir.path(), "a.txt", "Plain paragraph to translate.".as_bytes()).unwrap();
    let target = dir.path().join("a.English.txt");

    let provider = MockProvider::new(MockBehavior::Fixed("Texto traducido.".to_string()))
        .with_model("primary", MockBehavior::Failing(MockFailure::RateLimit));
    let probe = provider.clone();
    let store = Arc::new(MemoryTaskStore::new());
    store.insert(common::task(2, &origin, &target));

    let summary = common::runner(store.clone(), Arc::new(provider)).run(2).await.unwrap();

    assert_eq!(store.status(2), Some(TaskStatus::Done));
    assert_eq!(summary.report.fallback_used, 1);
    assert_eq!(probe.model_request_count("primary"), 3);
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "Texto traducido.");
}

#[tokio::test]
async fn test_run_withAuthenticationFailure_shouldFailWithoutOutput() {
    let dir = common::create_temp_dir().unwrap();
    let origin = common::create_test_file(
        dir.path(),
        "data.csv",
        b"title,body\nFirst,Some text\nSecond,More text\n",
    )
    .unwrap();
    let target = dir.path().join("data.English.csv");

    let provider = MockProvider::failing(MockFailure::Authentication);
    let probe = provider.clone();
    let store = Arc::new(MemoryTaskStore::new());
    let mut task = common::task(3, &origin, &target);
    task.threads = Some(1);
    store.insert(task);

    let error = common::runner(store.clone(), Arc::new(provider)).run(3).await.unwrap_err();

    assert!(matches!(error, JobError::Translation(_)));
    assert_eq!(probe.request_count(), 1);
    let record = store.record(3).unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    assert!(record.failed_reason.is_some_and(|r| r.contains("Authentication")));
    assert!(!target.exists());
}

#[tokio::test]
async fn test_run_withPdf_shouldFailBeforeStarting() {
    let dir = common::create_temp_dir().unwrap();
    let origin = common::create_test_file(dir.path(), "scan.pdf", b"%PDF-1.4").unwrap();
    let target = dir.path().join("scan.English.pdf");

    let provider = MockProvider::working();
    let probe = provider.clone();
    let store = Arc::new(MemoryTaskStore::new());
    store.insert(common::task(4, &origin, &target));

    let error = common::runner(store.clone(), Arc::new(provider)).run(4).await.unwrap_err();

    assert!(error.is_structural());
    assert_eq!(probe.request_count(), 0);
    assert!(store.progress_writes(4).is_empty());
    let record = store.record(4).unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    assert!(record.failed_reason.is_some_and(|r| r.contains("PDF")));
}

#[tokio::test]
async fn test_run_withMissingSourceFile_shouldRecordUnreadable() {
    let dir = common::create_temp_dir().unwrap();
    let origin = dir.path().join("missing.docx");
    let store = Arc::new(MemoryTaskStore::new());
    store.insert(common::task(5, &origin, &dir.path().join("out.docx")));

    let error = common::runner(store.clone(), Arc::new(MockProvider::working()))
        .run(5)
        .await
        .unwrap_err();

    assert!(error.is_structural());
    assert_eq!(store.status(5), Some(TaskStatus::Failed));
}

#[tokio::test]
async fn test_run_withProviderFromTask_shouldRequireCredentials() {
    let dir = common::create_temp_dir().unwrap();
    let origin = common::create_test_file(dir.path(), "a.txt", b"Hello there.").unwrap();
    let mut task = common::task(6, &origin, &dir.path().join("b.txt"));
    task.api_key = String::new();

    let store = Arc::new(MemoryTaskStore::new());
    store.insert(task);
    let error = JobRunner::new(store.clone()).run(6).await.unwrap_err();

    assert!(matches!(error, JobError::ProviderSetup(_)));
    assert_eq!(store.status(6), Some(TaskStatus::Failed));
}

#[tokio::test]
async fn test_run_withBilingualTask_shouldKeepOriginalParagraphs() {
    let dir = common::create_temp_dir().unwrap();
    let origin = common::create_test_file(dir.path(), "a.txt", b"Good morning.\n\nSee you soon.").unwrap();
    let target = dir.path().join("a.English.txt");
    let mut task = common::task(8, &origin, &target);
    task.output_type = "trans_all_both_new".to_string();

    let store = Arc::new(MemoryTaskStore::new());
    store.insert(task);
    common::runner(store.clone(), Arc::new(MockProvider::working()))
        .run(8)
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(&target).unwrap(),
        "Good morning.\n\n[TRANSLATED] Good morning.\n\nSee you soon.\n\n[TRANSLATED] See you soon."
    );
}

#[tokio::test]
async fn test_spawn_withSqliteStore_shouldCompleteInBackground() {
    let dir = common::create_temp_dir().unwrap();
    let origin = common::create_test_file(dir.path(), "sheet.csv", b"name,qty\nWidget,4\n").unwrap();
    let target = dir.path().join("sheet.English.csv");

    let store = Arc::new(SqliteTaskStore::new_in_memory().unwrap());
    let id = store.create_task(&common::task(0, &origin, &target)).await.unwrap();
    let dyn_store: Arc<dyn TaskStore> = store.clone();
    let runner = Arc::new(
        JobRunner::new(dyn_store)
            .with_settings(common::fast_settings())
            .with_provider(Arc::new(MockProvider::working())),
    );

    let summary = runner.spawn(id).await.unwrap().unwrap();

    let record = store.get_task(id).await.unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Done);
    assert_eq!(record.process, 100.0);
    assert_eq!(record.target_filesize as u64, summary.target_filesize);
    assert_eq!(
        std::fs::read_to_string(&target).unwrap(),
        "[TRANSLATED] name,[TRANSLATED] qty\n[TRANSLATED] Widget,4\n"
    );
}
