//! Deployment API models
//!
//! Field names follow the camelCase wire contract consumed by the browser client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Error body for non-2xx API responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Archive upload carried inline in a submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivePayload {
    /// Declared file name, e.g. `my-site.zip`
    pub name: String,

    /// Declared MIME type, if the client knows it
    #[serde(default)]
    pub content_type: Option<String>,

    /// Base64-encoded archive bytes
    pub data: String,
}

/// Deployment submission. Exactly one of `archive` or `repository_url` must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitDeploymentRequest {
    #[serde(default)]
    pub archive: Option<ArchivePayload>,

    #[serde(default)]
    pub repository_url: Option<String>,
}

/// Submission response: either a deployment id or a rejection message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitDeploymentResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SubmitDeploymentResponse {
    pub fn accepted(deployment_id: impl Into<String>) -> Self {
        Self {
            success: true,
            deployment_id: Some(deployment_id.into()),
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            deployment_id: None,
            message: Some(message.into()),
        }
    }
}

/// Terminal outcome of a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResult {
    pub success: bool,
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Payload of the `complete` progress event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletePayload {
    #[serde(flatten)]
    pub result: DeploymentResult,
    pub logs: Vec<String>,
}

/// Payload of the stream-level `error` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamErrorPayload {
    pub message: String,
}

/// Point-in-time view of a deployment job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSnapshotResponse {
    pub id: String,
    pub status: String,
    pub is_done: bool,
    pub logs: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<DeploymentResult>,

    pub created_at: DateTime<Utc>,
}
