//! Job store tests

use std::sync::Arc;
use std::time::Duration;

use sitedrop::jobs::store::{JobReader, JobStore, JobStoreError, JobWriter, MemoryJobStore};
use sitedrop_api::DeploymentResult;

fn failed(error: &str) -> DeploymentResult {
    DeploymentResult {
        success: false,
        message: "Deployment of demo failed".to_string(),
        project_name: Some("demo".to_string()),
        deployed_url: None,
        error: Some(error.to_string()),
    }
}

#[tokio::test]
async fn test_new_job_is_initialized() {
    let store = MemoryJobStore::new();
    let id = store.create().await.unwrap();

    let job = store.get(&id).await.unwrap();
    assert_eq!(job.id, id);
    assert_eq!(job.status, "Initialized");
    assert!(job.logs.is_empty());
    assert!(!job.is_done);
    assert!(job.result.is_none());
}

#[tokio::test]
async fn test_ids_are_unique() {
    let store = MemoryJobStore::new();
    let a = store.create().await.unwrap();
    let b = store.create().await.unwrap();
    assert_ne!(a, b);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_writer_and_reader_share_one_job() {
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let id = store.create().await.unwrap();

    let writer = JobWriter::new(id.clone(), store.clone());
    let reader = JobReader::new(store);

    writer.log("Extracting site.zip").await;
    writer.status("Extracting").await;
    writer.log("Extracted 3 files").await;

    let delta = reader.delta(&id, 1).await.unwrap();
    assert_eq!(delta.new_logs, vec!["Extracted 3 files".to_string()]);
    assert_eq!(delta.log_count, 2);
    assert_eq!(delta.status, "Extracting");
    assert!(!delta.is_done);
}

#[tokio::test]
async fn test_completed_job_is_frozen() {
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let id = store.create().await.unwrap();
    let writer = JobWriter::new(id.clone(), store.clone());

    writer.log("Cloning").await;
    writer.complete(failed("SourceFetchError: clone failed")).await.unwrap();

    // Later writes are dropped silently by the writer and rejected by the store
    writer.log("too late").await;
    writer.status("Uploading").await;
    let second = writer.complete(failed("InternalError: twice")).await;
    assert!(matches!(second, Err(JobStoreError::Finalized(_))));

    let job = store.get(&id).await.unwrap();
    assert_eq!(job.logs, vec!["Cloning".to_string()]);
    assert_eq!(job.status, "Failed");
    assert_eq!(job.result.unwrap().error.as_deref(), Some("SourceFetchError: clone failed"));
}

#[test]
fn test_unknown_job() {
    let store = MemoryJobStore::new();
    tokio_test::block_on(async {
        assert!(store.get("nope").await.is_none());
        assert!(matches!(
            store.append_log("nope", "x".to_string()).await,
            Err(JobStoreError::NotFound(_))
        ));
    });
}

#[tokio::test]
async fn test_sweep_keeps_running_jobs() {
    let store = MemoryJobStore::new();
    let running = store.create().await.unwrap();
    let done = store.create().await.unwrap();
    store.complete(&done, failed("BuildFailedError: exit 1")).await.unwrap();

    // Nothing is old enough yet
    assert_eq!(store.sweep_expired(Duration::from_secs(3600)).await, 0);

    assert_eq!(store.sweep_expired(Duration::ZERO).await, 1);
    assert!(store.get(&done).await.is_none());
    assert!(store.get(&running).await.is_some());
}
