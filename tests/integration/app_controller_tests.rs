/*!
 * Controller tests: file and folder runs against an in-memory task database.
 */

use std::sync::Arc;

use doctrans::app_config::Config;
use doctrans::app_controller::Controller;
use doctrans::providers::mock::{MockFailure, MockProvider};
use doctrans::task::{SqliteTaskStore, TaskStatus};

use crate::common;

fn test_config() -> Config {
    let mut config = Config::default();
    config.target_language = "English".to_string();
    config.translation.common.retry_delay_ms = 1;
    config.translation.common.progress_step = 0.0;
    config
}

fn controller(provider: MockProvider) -> Controller {
    common::init_logging();
    Controller::with_store(test_config(), SqliteTaskStore::new_in_memory().unwrap())
        .with_provider(Arc::new(provider))
}

#[tokio::test]
async fn test_run_withTextFile_shouldWriteLanguageSuffixedOutput() {
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_test_file(dir.path(), "letter.txt", b"Dear team,\n\nThanks for the update.").unwrap();
    let output_dir = dir.path().join("out");
    let controller = controller(MockProvider::working());

    let summary = controller
        .run(input, output_dir.clone(), false)
        .await
        .unwrap()
        .expect("first run should translate");

    let output = output_dir.join("letter.English.txt");
    assert_eq!(summary.target_path, output);
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "[TRANSLATED] Dear team,\n\n[TRANSLATED] Thanks for the update."
    );

    let record = controller.show_task(summary.task_id).await.unwrap();
    assert_eq!(record.status, TaskStatus::Done);
    assert_eq!(record.config.lang, "English");
}

#[tokio::test]
async fn test_run_withExistingOutput_shouldSkipUnlessForced() {
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_test_file(dir.path(), "memo.md", b"# Memo\n\nShip it.").unwrap();
    let provider = MockProvider::working();
    let probe = provider.clone();
    let controller = controller(provider);

    assert!(controller.run(input.clone(), dir.path().to_path_buf(), false).await.unwrap().is_some());
    let calls_after_first = probe.request_count();

    assert!(controller.run(input.clone(), dir.path().to_path_buf(), false).await.unwrap().is_none());
    assert_eq!(probe.request_count(), calls_after_first);

    assert!(controller.run(input, dir.path().to_path_buf(), true).await.unwrap().is_some());
    assert!(probe.request_count() > calls_after_first);
}

#[tokio::test]
async fn test_run_withMissingInput_shouldError() {
    let dir = common::create_temp_dir().unwrap();
    let controller = controller(MockProvider::working());
    let result = controller
        .run(dir.path().join("nope.docx"), dir.path().to_path_buf(), false)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_runFolder_withMixedFiles_shouldCountOutcomes() {
    let dir = common::create_temp_dir().unwrap();
    common::create_test_file(dir.path(), "a.txt", b"First document.").unwrap();
    common::create_test_file(dir.path(), "b.csv", b"city\nParis\n").unwrap();
    common::create_test_file(dir.path(), "c.English.txt", b"Earlier output.").unwrap();
    common::create_test_file(dir.path(), "d.pdf", b"%PDF-1.7").unwrap();
    common::create_test_file(dir.path(), "e.bin", b"\x00\x01").unwrap();
    let controller = controller(MockProvider::working());

    let summary = controller.run_folder(dir.path().to_path_buf(), None, false).await.unwrap();
    assert_eq!((summary.processed, summary.skipped, summary.failed), (2, 0, 1));
    assert!(dir.path().join("a.English.txt").exists());
    assert!(dir.path().join("b.English.csv").exists());
    assert!(!dir.path().join("c.English.English.txt").exists());

    let again = controller.run_folder(dir.path().to_path_buf(), None, false).await.unwrap();
    assert_eq!((again.processed, again.skipped, again.failed), (0, 2, 1));
}

#[tokio::test]
async fn test_runFolder_withNoDocuments_shouldError() {
    let dir = common::create_temp_dir().unwrap();
    common::create_test_file(dir.path(), "readme.bin", b"binary").unwrap();
    let controller = controller(MockProvider::working());
    assert!(controller.run_folder(dir.path().to_path_buf(), None, false).await.is_err());
}

#[tokio::test]
async fn test_createTask_thenRunTask_shouldUseStoredGlossary() {
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_test_file(dir.path(), "api.txt", b"The API is stable.").unwrap();
    let target = dir.path().join("api.English.txt");
    let provider = MockProvider::working();
    let probe = provider.clone();
    let controller = controller(provider);

    let id = controller
        .create_task(&input, &target, Some("API,接口".to_string()))
        .await
        .unwrap();
    let stored = controller.show_task(id).await.unwrap();
    assert_eq!(stored.status, TaskStatus::None);
    assert_eq!(stored.config.glossary, "API,接口");

    controller.run_task(id).await.unwrap();

    assert!(probe.calls()[0].instruction.contains("API → 接口"));
    assert_eq!(controller.show_task(id).await.unwrap().status, TaskStatus::Done);
    assert!(target.exists());
}

#[tokio::test]
async fn test_runTask_withAuthenticationFailure_shouldRecordReason() {
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_test_file(dir.path(), "a.txt", b"Hello.").unwrap();
    let controller = controller(MockProvider::failing(MockFailure::Authentication));

    let id = controller
        .create_task(&input, &dir.path().join("a.English.txt"), None)
        .await
        .unwrap();
    assert!(controller.run_task(id).await.is_err());

    let record = controller.show_task(id).await.unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    assert_eq!(record.failed_count, 1);
    assert!(record.failed_reason.is_some());
}

#[tokio::test]
async fn test_showTask_withUnknownId_shouldError() {
    let controller = controller(MockProvider::working());
    let error = controller.show_task(404).await.unwrap_err();
    assert!(error.to_string().contains("404"));
}

#[tokio::test]
async fn test_checkConnection_withFailingProvider_shouldError() {
    tokio_test::assert_ok!(controller(MockProvider::working()).check_connection().await);
    tokio_test::assert_err!(
        controller(MockProvider::failing(MockFailure::Connection))
            .check_connection()
            .await
    );
}
