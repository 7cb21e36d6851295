//! Application state management

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::app::options::AppOptions;
use crate::blob::{BlobError, BlobStore, ObjectBlobStore};
use crate::deploy::builder::Builder;
use crate::deploy::classifier::{Classifier, FrameworkOracle};
use crate::deploy::pipeline::Pipeline;
use crate::deploy::publisher::Publisher;
use crate::deploy::runner::{CommandRunner, ShellRunner};
use crate::errors::DeployError;
use crate::http::oracle::HttpOracle;
use crate::jobs::store::{JobStore, MemoryJobStore};

/// Key probed at startup to check the blob store is reachable
const PREFLIGHT_KEY: &str = "sites/.sitedrop-preflight";

/// Main application state
pub struct AppState {
    /// Blob store behind published sites
    pub blobs: Arc<dyn BlobStore>,

    /// Job registry
    pub jobs: Arc<dyn JobStore>,

    /// Deployment orchestrator
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    /// Initialize application state
    pub async fn init(options: &AppOptions) -> Result<Self, DeployError> {
        info!("Initializing application state...");

        options.layout.setup().await?;

        let blobs: Arc<dyn BlobStore> = Arc::new(ObjectBlobStore::from_settings(&options.blob_store)?);
        preflight(blobs.as_ref()).await?;

        let oracle: Option<Arc<dyn FrameworkOracle>> = match &options.oracle {
            Some(settings) => {
                let oracle = HttpOracle::new(settings)?;
                info!("Framework oracle enabled at {}", oracle.endpoint());
                Some(Arc::new(oracle))
            }
            None => None,
        };
        let min_confidence = options
            .oracle
            .as_ref()
            .map(|o| o.min_confidence)
            .unwrap_or(1.0);

        let runner: Arc<dyn CommandRunner> = Arc::new(ShellRunner::new());
        Ok(Self::with_parts(options, blobs, runner, oracle, min_confidence))
    }

    /// Assemble state from already-built collaborators
    pub fn with_parts(
        options: &AppOptions,
        blobs: Arc<dyn BlobStore>,
        runner: Arc<dyn CommandRunner>,
        oracle: Option<Arc<dyn FrameworkOracle>>,
        min_confidence: f32,
    ) -> Self {
        let jobs: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());

        let pipeline = Arc::new(Pipeline::new(
            jobs.clone(),
            Classifier::new(oracle, min_confidence),
            Builder::new(
                runner,
                options.build.install_command.clone(),
                options.build.build_timeout_secs.map(Duration::from_secs),
            ),
            Publisher::new(blobs.clone(), options.build.publish_concurrency),
            options.layout.workspace_root.clone(),
        ));

        Self {
            blobs,
            jobs,
            pipeline,
        }
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), DeployError> {
        info!("Shutting down application state...");
        Ok(())
    }
}

/// Fail fast when the blob store is unusable; a missing probe key is fine
pub async fn preflight(blobs: &dyn BlobStore) -> Result<(), DeployError> {
    match blobs.head(PREFLIGHT_KEY).await {
        Ok(_) | Err(BlobError::NotFound(_)) => Ok(()),
        Err(BlobError::Misconfigured(msg)) => Err(DeployError::ConfigError(msg)),
        Err(e) => {
            warn!("Blob store preflight failed: {}", e);
            Err(DeployError::ConfigError(e.to_string()))
        }
    }
}
