//! Deployment job store

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sitedrop_api::DeploymentResult;
use thiserror::Error;
use tracing::{debug, info};

use crate::deploy::fsm::JobPhase;
use crate::jobs::model::{DeploymentJob, JobDelta};
use crate::utils::generate_uuid;

/// Job store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobStoreError {
    #[error("Job not found: {0}")]
    NotFound(String),

    /// The job is terminal; its logs, status and result are frozen
    #[error("Job already finalized: {0}")]
    Finalized(String),
}

/// Registry of deployment jobs keyed by job ID
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a job in the `Initialized` state and return its ID
    async fn create(&self) -> Result<String, JobStoreError>;

    /// Append a log line
    async fn append_log(&self, id: &str, line: String) -> Result<(), JobStoreError>;

    /// Replace the status label
    async fn update_status(&self, id: &str, status: &str) -> Result<(), JobStoreError>;

    /// Mark the job done with its result. Succeeds at most once per job.
    async fn complete(&self, id: &str, result: DeploymentResult) -> Result<(), JobStoreError>;

    /// Full copy of a job
    async fn get(&self, id: &str) -> Option<DeploymentJob>;

    /// Changes since `offset` log lines
    async fn delta(&self, id: &str, offset: usize) -> Option<JobDelta> {
        self.get(id).await.map(|job| JobDelta::from_job(&job, offset))
    }

    /// Remove finished jobs created more than `retention` ago; returns how many were removed
    async fn sweep_expired(&self, retention: Duration) -> usize;
}

/// In-process job store
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, DeploymentJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of tracked jobs
    pub fn len(&self) -> usize {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` against a live job
    fn mutate<F>(&self, id: &str, f: F) -> Result<(), JobStoreError>
    where
        F: FnOnce(&mut DeploymentJob),
    {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| JobStoreError::NotFound(id.to_string()))?;

        if job.is_done {
            return Err(JobStoreError::Finalized(id.to_string()));
        }

        f(job);
        Ok(())
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self) -> Result<String, JobStoreError> {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());

        let mut id = generate_uuid();
        while jobs.contains_key(&id) {
            id = generate_uuid();
        }

        jobs.insert(id.clone(), DeploymentJob::new(id.clone()));
        debug!("Created job {}", id);
        Ok(id)
    }

    async fn append_log(&self, id: &str, line: String) -> Result<(), JobStoreError> {
        self.mutate(id, |job| job.logs.push(line))
    }

    async fn update_status(&self, id: &str, status: &str) -> Result<(), JobStoreError> {
        self.mutate(id, |job| job.status = status.to_string())
    }

    async fn complete(&self, id: &str, result: DeploymentResult) -> Result<(), JobStoreError> {
        self.mutate(id, |job| {
            let phase = if result.success { JobPhase::Completed } else { JobPhase::Failed };
            job.status = phase.label().to_string();
            job.result = Some(result);
            job.is_done = true;
        })
    }

    async fn get(&self, id: &str) -> Option<DeploymentJob> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        jobs.get(id).cloned()
    }

    async fn delta(&self, id: &str, offset: usize) -> Option<JobDelta> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        jobs.get(id).map(|job| JobDelta::from_job(job, offset))
    }

    async fn sweep_expired(&self, retention: Duration) -> usize {
        let retention = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(retention)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);

        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        let before = jobs.len();
        jobs.retain(|_, job| !(job.is_done && job.created_at < cutoff));
        let removed = before - jobs.len();

        if removed > 0 {
            info!("Expired {} finished job(s)", removed);
        }
        removed
    }
}

/// Write capability for a single job, held by its pipeline run.
///
/// Rejected writes are logged and otherwise ignored: a terminal job stays frozen.
#[derive(Clone)]
pub struct JobWriter {
    id: String,
    store: Arc<dyn JobStore>,
}

impl JobWriter {
    pub fn new(id: String, store: Arc<dyn JobStore>) -> Self {
        Self { id, store }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Append a log line
    pub async fn log(&self, line: impl Into<String>) {
        if let Err(e) = self.store.append_log(&self.id, line.into()).await {
            debug!("Dropped log line: {}", e);
        }
    }

    /// Replace the status label
    pub async fn status(&self, status: &str) {
        if let Err(e) = self.store.update_status(&self.id, status).await {
            debug!("Dropped status update: {}", e);
        }
    }

    /// Finalize the job
    pub async fn complete(&self, result: DeploymentResult) -> Result<(), JobStoreError> {
        self.store.complete(&self.id, result).await
    }
}

/// Read-only capability over the store, held by progress streams and handlers
#[derive(Clone)]
pub struct JobReader {
    store: Arc<dyn JobStore>,
}

impl JobReader {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> Option<DeploymentJob> {
        self.store.get(id).await
    }

    pub async fn delta(&self, id: &str, offset: usize) -> Option<JobDelta> {
        self.store.delta(id, offset).await
    }
}
