//! Error types for the deployment service

use std::path::PathBuf;

use thiserror::Error;

/// Build stage an external command belonged to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Install,
    Build,
}

impl std::fmt::Display for BuildStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStage::Install => write!(f, "install"),
            BuildStage::Build => write!(f, "build"),
        }
    }
}

/// Main error type for the deployment service
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Archive contains no files: {0}")]
    EmptyArchive(String),

    #[error("Failed to fetch source: {0}")]
    SourceFetch(String),

    #[error("{stage} step failed (exit code {}): {}", exit_code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()), tail(stderr, stdout))]
    BuildFailed {
        stage: BuildStage,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("No build output directory found (searched: {}); project root contains: [{}]", searched.join(", "), contents.join(", "))]
    OutputDirectoryNotFound {
        root: PathBuf,
        searched: Vec<String>,
        contents: Vec<String>,
    },

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Taxonomy name reported to clients in a failed result
    pub fn kind(&self) -> &'static str {
        match self {
            DeployError::InvalidInput(_) => "InvalidInputError",
            DeployError::EmptyArchive(_) => "EmptyArchiveError",
            DeployError::SourceFetch(_) => "SourceFetchError",
            DeployError::BuildFailed { .. } => "BuildFailedError",
            DeployError::OutputDirectoryNotFound { .. } => "OutputDirectoryNotFoundError",
            DeployError::Publish(_) => "PublishError",
            DeployError::ConfigError(_) => "ConfigurationError",
            DeployError::NotFound(_) => "NotFoundError",
            DeployError::IoError(_)
            | DeployError::JsonError(_)
            | DeployError::HttpError(_)
            | DeployError::ServerError(_)
            | DeployError::ShutdownError(_)
            | DeployError::Internal(_) => "InternalError",
        }
    }

    /// Faults of the service itself rather than of the submitted project
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            DeployError::ConfigError(_)
                | DeployError::IoError(_)
                | DeployError::ServerError(_)
                | DeployError::ShutdownError(_)
                | DeployError::Internal(_)
        )
    }
}

/// Last lines of captured output for the error message; full output stays on the variant.
fn tail(stderr: &str, stdout: &str) -> String {
    const MAX_LINES: usize = 20;
    let source = if stderr.trim().is_empty() { stdout } else { stderr };
    let lines: Vec<&str> = source.lines().collect();
    let start = lines.len().saturating_sub(MAX_LINES);
    lines[start..].join("\n")
}
