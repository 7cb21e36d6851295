//! Deployment job models

use chrono::{DateTime, Utc};
use sitedrop_api::{DeploymentResult, DeploymentSnapshotResponse};

use crate::deploy::fsm::JobPhase;

/// One deployment request from submission to terminal outcome
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentJob {
    /// Unique job ID
    pub id: String,

    /// Append-only log lines
    pub logs: Vec<String>,

    /// Current phase label
    pub status: String,

    /// Set exactly once when the job reaches a terminal state
    pub is_done: bool,

    /// Present once `is_done`
    pub result: Option<DeploymentResult>,

    /// Creation time, used for expiry
    pub created_at: DateTime<Utc>,
}

impl DeploymentJob {
    pub fn new(id: String) -> Self {
        Self {
            id,
            logs: Vec::new(),
            status: JobPhase::Initialized.label().to_string(),
            is_done: false,
            result: None,
            created_at: Utc::now(),
        }
    }
}

impl From<DeploymentJob> for DeploymentSnapshotResponse {
    fn from(job: DeploymentJob) -> Self {
        Self {
            id: job.id,
            status: job.status,
            is_done: job.is_done,
            logs: job.logs,
            result: job.result,
            created_at: job.created_at,
        }
    }
}

/// Changes to a job since a log offset, as seen by one observer poll
#[derive(Debug, Clone, PartialEq)]
pub struct JobDelta {
    /// Log lines at index `offset..`
    pub new_logs: Vec<String>,

    /// Total number of log lines
    pub log_count: usize,

    pub status: String,
    pub is_done: bool,
    pub result: Option<DeploymentResult>,
}

impl JobDelta {
    /// Build a delta from a full job view
    pub fn from_job(job: &DeploymentJob, offset: usize) -> Self {
        let start = offset.min(job.logs.len());
        Self {
            new_logs: job.logs[start..].to_vec(),
            log_count: job.logs.len(),
            status: job.status.clone(),
            is_done: job.is_done,
            result: job.result.clone(),
        }
    }
}
