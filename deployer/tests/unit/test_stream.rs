//! Progress stream tests

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use sitedrop::jobs::store::{JobReader, JobStore, MemoryJobStore};
use sitedrop::jobs::stream::{progress_stream, ProgressEvent};
use sitedrop_api::DeploymentResult;

fn deployed() -> DeploymentResult {
    DeploymentResult {
        success: true,
        message: "Deployed 2 files".to_string(),
        project_name: Some("demo".to_string()),
        deployed_url: Some("/sites/demo".to_string()),
        error: None,
    }
}

#[tokio::test]
async fn test_finished_job_replays_logs_then_completes() {
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let id = store.create().await.unwrap();
    for i in 0..5 {
        store.append_log(&id, format!("line {}", i)).await.unwrap();
    }
    store.complete(&id, deployed()).await.unwrap();

    let events: Vec<_> = progress_stream(JobReader::new(store), id, Duration::from_millis(10))
        .collect()
        .await;

    assert_eq!(events.len(), 6);
    for (i, event) in events.iter().take(5).enumerate() {
        assert_eq!(event, &ProgressEvent::Log(format!("line {}", i)));
    }
    match &events[5] {
        ProgressEvent::Complete(payload) => {
            assert_eq!(payload.result, deployed());
            assert_eq!(payload.logs.len(), 5);
            assert_eq!(payload.logs[4], "line 4");
        }
        other => panic!("expected complete, got {:?}", other),
    }
}

#[tokio::test]
async fn test_live_job_is_followed_to_completion() {
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let id = store.create().await.unwrap();

    let stream = progress_stream(JobReader::new(store.clone()), id.clone(), Duration::from_millis(5));
    let collector = tokio::spawn(stream.collect::<Vec<_>>());

    tokio::time::sleep(Duration::from_millis(20)).await;
    store.update_status(&id, "Extracting").await.unwrap();
    store.append_log(&id, "Extracted 2 files".to_string()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    store.complete(&id, deployed()).await.unwrap();

    let events = tokio::time::timeout(Duration::from_secs(5), collector)
        .await
        .unwrap()
        .unwrap();

    let names: Vec<_> = events.iter().map(|e| e.name()).collect();
    assert_eq!(names.first(), Some(&"status"));
    assert_eq!(names.last(), Some(&"complete"));
    assert!(events.contains(&ProgressEvent::Status("Extracting".to_string())));
    assert!(events.contains(&ProgressEvent::Log("Extracted 2 files".to_string())));

    // Each status change is reported once
    let statuses = events.iter().filter(|e| e.name() == "status").count();
    assert_eq!(statuses, 2);
}
