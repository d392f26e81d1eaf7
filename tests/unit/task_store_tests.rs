/*!
 * Tests for the SQLite task store through the `TaskStore` trait
 */

use std::path::Path;

use doctrans::task::{SqliteTaskStore, TaskStatus, TaskStore};

use crate::common;

#[tokio::test]
async fn test_lifecycle_withFailure_shouldTruncateReasonAndCount() {
    let store = SqliteTaskStore::new_in_memory().unwrap();
    let id = store
        .create_task(&common::task(0, Path::new("a.txt"), Path::new("b.txt")))
        .await
        .unwrap();

    store.mark_started(id).await.unwrap();
    store.update_progress(id, 30.0).await.unwrap();
    store.mark_failed(id, &"x".repeat(800)).await.unwrap();

    let record = store.get_task(id).await.unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    assert_eq!(record.failed_count, 1);
    assert_eq!(record.failed_reason.unwrap().chars().count(), 500);
    assert!(record.end_at.is_some());
}

#[tokio::test]
async fn test_load_shouldReturnStoredParameters() {
    let store = SqliteTaskStore::new_in_memory().unwrap();
    let mut task = common::task(0, Path::new("/in/deck.pptx"), Path::new("/out/deck.pptx"));
    task.glossary = "API,接口".to_string();
    let id = store.create_task(&task).await.unwrap();

    let loaded = store.load(id).await.unwrap();
    assert_eq!(loaded.id, id);
    assert_eq!(loaded.origin_filepath, Path::new("/in/deck.pptx"));
    assert_eq!(loaded.model, "primary");
    assert_eq!(loaded.backup_model.as_deref(), Some("backup"));
    assert_eq!(loaded.glossary, "API,接口");
}

#[tokio::test]
async fn test_updates_withUnknownTask_shouldFail() {
    let store = SqliteTaskStore::new_in_memory().unwrap();
    assert!(store.load(99).await.is_err());
    assert!(store.mark_started(99).await.is_err());
    assert!(store.update_progress(99, 10.0).await.is_err());
    assert!(store.mark_done(99, 1, 1).await.is_err());
}

#[tokio::test]
async fn test_listTasks_shouldReturnNewestFirst() {
    let store = SqliteTaskStore::new_in_memory().unwrap();
    let first = store
        .create_task(&common::task(0, Path::new("1.md"), Path::new("1.out.md")))
        .await
        .unwrap();
    let second = store
        .create_task(&common::task(0, Path::new("2.md"), Path::new("2.out.md")))
        .await
        .unwrap();

    let ids: Vec<i64> = store.list_tasks(10).await.unwrap().iter().map(|r| r.config.id).collect();
    assert_eq!(ids, vec![second, first]);
    assert_eq!(store.list_tasks(1).await.unwrap().len(), 1);
}
