//! Deployment orchestration
//!
//! Sequences extraction, classification, build and publish for one job, writing
//! progress into the job store. Each job runs at most once and always ends in a
//! terminal result with its workspace removed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use bytes::Bytes;
use sitedrop_api::{DeploymentResult, SubmitDeploymentRequest};
use tracing::{error, info, info_span, warn, Instrument, Span};

use crate::deploy::archive::{extract_archive, ArchiveFormat};
use crate::deploy::builder::Builder;
use crate::deploy::classifier::Classifier;
use crate::deploy::fsm::{JobFsm, PhaseEvent};
use crate::deploy::git::{shallow_clone, RepositoryRef};
use crate::deploy::locator::locate_project;
use crate::deploy::naming::{base_path, sanitize_project_name, site_prefix};
use crate::deploy::publisher::Publisher;
use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::jobs::store::{JobStore, JobWriter};

/// A validated deployment source
#[derive(Debug, Clone)]
pub enum DeploymentSource {
    Archive {
        name: String,
        format: ArchiveFormat,
        data: Bytes,
    },
    Repository(RepositoryRef),
}

impl DeploymentSource {
    /// Validate a submission. Nothing is created when this fails.
    pub fn from_request(
        request: SubmitDeploymentRequest,
        allowed_hosts: &[String],
    ) -> Result<Self, DeployError> {
        match (request.archive, request.repository_url) {
            (Some(_), Some(_)) => Err(DeployError::InvalidInput(
                "Provide either an archive or a repository URL, not both".to_string(),
            )),
            (None, None) => Err(DeployError::InvalidInput(
                "Provide an archive or a repository URL".to_string(),
            )),
            (None, Some(url)) => Ok(DeploymentSource::Repository(RepositoryRef::parse(
                &url,
                allowed_hosts,
            )?)),
            (Some(archive), None) => {
                let format = ArchiveFormat::detect(&archive.name, archive.content_type.as_deref())?;

                // Accept data URLs as produced by FileReader.readAsDataURL
                let encoded = match archive.data.split_once(";base64,") {
                    Some((prefix, rest)) if prefix.starts_with("data:") => rest,
                    _ => archive.data.as_str(),
                };
                let data = base64::engine::general_purpose::STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| DeployError::InvalidInput(format!("Archive data is not valid base64: {}", e)))?;
                if data.is_empty() {
                    return Err(DeployError::InvalidInput("Archive data is empty".to_string()));
                }

                Ok(DeploymentSource::Archive {
                    name: archive.name,
                    format,
                    data: Bytes::from(data),
                })
            }
        }
    }

    /// Name the project is derived from
    pub fn source_name(&self) -> &str {
        match self {
            DeploymentSource::Archive { name, .. } => name,
            DeploymentSource::Repository(repo) => &repo.repo,
        }
    }

    fn describe(&self) -> String {
        match self {
            DeploymentSource::Archive { name, data, .. } => {
                format!("archive {} ({} bytes)", name, data.len())
            }
            DeploymentSource::Repository(repo) => format!("repository {}", repo.url),
        }
    }
}

/// Deployment orchestrator
pub struct Pipeline {
    jobs: Arc<dyn JobStore>,
    classifier: Classifier,
    builder: Builder,
    publisher: Publisher,
    workspace_root: PathBuf,
}

impl Pipeline {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        classifier: Classifier,
        builder: Builder,
        publisher: Publisher,
        workspace_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            jobs,
            classifier,
            builder,
            publisher,
            workspace_root: workspace_root.into(),
        }
    }

    pub fn jobs(&self) -> Arc<dyn JobStore> {
        self.jobs.clone()
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Create a job and start it in the background; returns the job ID immediately
    pub async fn submit(self: &Arc<Self>, source: DeploymentSource) -> Result<String, DeployError> {
        let id = self
            .jobs
            .create()
            .await
            .map_err(|e| DeployError::Internal(e.to_string()))?;

        info!(job_id = %id, "Accepted deployment of {}", source.describe());

        let pipeline = self.clone();
        let span = info_span!("deployment", job_id = %id);
        let job_id = id.clone();
        tokio::spawn(
            async move {
                pipeline.run(job_id, source).await;
            }
            .instrument(span),
        );

        Ok(id)
    }

    /// Run job `id` to its terminal state and return the recorded result
    pub async fn run(self: Arc<Self>, id: String, source: DeploymentSource) -> DeploymentResult {
        let job = JobWriter::new(id.clone(), self.jobs.clone());
        let project_name = sanitize_project_name(source.source_name());

        let (fsm, outcome) = match Dir::create_job_dir(&self.workspace_root, &id).await {
            Ok(workspace) => {
                let pipeline = self.clone();
                let task_job = job.clone();
                let task_name = project_name.clone();
                let task_dir = workspace.path().to_owned();

                let handle = tokio::spawn(
                    async move {
                        let mut fsm = JobFsm::new();
                        let outcome = pipeline
                            .execute(&mut fsm, &task_job, source, &task_name, &task_dir)
                            .await;
                        (fsm, outcome)
                    }
                    .instrument(Span::current()),
                );

                let joined = match handle.await {
                    Ok(joined) => joined,
                    Err(e) if e.is_panic() => (
                        JobFsm::new(),
                        Err(DeployError::Internal("Deployment task panicked".to_string())),
                    ),
                    Err(_) => (
                        JobFsm::new(),
                        Err(DeployError::Internal("Deployment task was cancelled".to_string())),
                    ),
                };

                if let Err(e) = workspace.delete().await {
                    warn!("Failed to remove workspace {}: {}", workspace.path().display(), e);
                }
                joined
            }
            Err(e) => (JobFsm::new(), Err(e)),
        };

        let result = match outcome {
            Ok(result) => {
                info!("Deployment succeeded: {}", result.message);
                result
            }
            Err(e) => self.failure(&job, fsm, &project_name, e).await,
        };

        if let Err(e) = job.complete(result.clone()).await {
            warn!("Could not record deployment result: {}", e);
        }
        result
    }

    async fn execute(
        &self,
        fsm: &mut JobFsm,
        job: &JobWriter,
        source: DeploymentSource,
        project_name: &str,
        workspace: &Path,
    ) -> Result<DeploymentResult, DeployError> {
        job.log(format!("Starting deployment of {}", source.describe())).await;
        job.log(format!("Project name: {}", project_name)).await;

        self.advance(fsm, PhaseEvent::Extract, job).await?;
        let source_dir = workspace.join("source");
        match source {
            DeploymentSource::Archive { name, format, data } => {
                job.log(format!("Extracting {}", name)).await;
                let report = extract_archive(data, format, &source_dir).await?;
                for entry in &report.skipped {
                    job.log(format!("Skipped archive entry: {}", entry)).await;
                }
                job.log(format!("Extracted {} files", report.files)).await;
            }
            DeploymentSource::Repository(repo) => {
                job.log(format!("Cloning {} (shallow)", repo.url)).await;
                shallow_clone(&repo, &source_dir).await?;
                job.log("Repository cloned").await;
            }
        }

        self.advance(fsm, PhaseEvent::Classify, job).await?;
        let layout = locate_project(&source_dir).await?;
        match (&layout.manifest_relative_path, &layout.entry_document_relative_path) {
            (Some(manifest), _) => job.log(format!("Found {}", manifest.display())).await,
            (None, Some(entry)) => job.log(format!("Found {}", entry.display())).await,
            (None, None) => job.log("No package.json or index.html found, using the archive root").await,
        }

        let mut framework = self.classifier.detect(&layout, job).await?;
        job.log(format!(
            "Detected {} (confidence {:.1}){}",
            framework.identity,
            framework.confidence,
            framework
                .reasoning
                .as_ref()
                .map(|r| format!(": {}", r))
                .unwrap_or_default()
        ))
        .await;

        let output_dir = if framework.needs_build() {
            self.advance(fsm, PhaseEvent::Build, job).await?;
            self.builder
                .build(&layout.root_path, &mut framework, project_name, job)
                .await?
        } else {
            job.log("No build step required").await;
            layout.root_path.clone()
        };

        self.advance(fsm, PhaseEvent::Upload, job).await?;
        let prefix = site_prefix(project_name);
        job.log(format!("Uploading to {}", prefix)).await;
        let keys = self.publisher.publish(&output_dir, &prefix).await?;
        job.log(format!("Uploaded {} files", keys.len())).await;

        fsm.process(PhaseEvent::Succeed).map_err(DeployError::Internal)?;

        let deployed_url = base_path(project_name);
        job.log(format!("Deployed to {}", deployed_url)).await;

        Ok(DeploymentResult {
            success: true,
            message: format!("Deployed {} files", keys.len()),
            project_name: Some(project_name.to_string()),
            deployed_url: Some(deployed_url),
            error: None,
        })
    }

    async fn advance(&self, fsm: &mut JobFsm, event: PhaseEvent, job: &JobWriter) -> Result<(), DeployError> {
        let phase = fsm.process(event).map_err(DeployError::Internal)?;
        job.status(phase.label()).await;
        Ok(())
    }

    async fn failure(
        &self,
        job: &JobWriter,
        mut fsm: JobFsm,
        project_name: &str,
        err: DeployError,
    ) -> DeploymentResult {
        let kind = err.kind();
        if err.is_operational() {
            error!(kind, operational = true, "Deployment failed: {}", err);
        } else {
            warn!(kind, "Deployment failed: {}", err);
        }

        let detail = err.to_string();
        let failed_in = fsm.phase();
        match fsm.process(PhaseEvent::Fail(detail.clone())) {
            Ok(phase) => job.status(phase.label()).await,
            Err(e) => warn!("{}", e),
        }
        job.log(format!(
            "Deployment failed during {} phase: {}",
            failed_in.label(),
            fsm.error().unwrap_or(&detail)
        ))
        .await;

        DeploymentResult {
            success: false,
            message: format!("Deployment of {} failed", project_name),
            project_name: Some(project_name.to_string()),
            deployed_url: None,
            error: Some(format!("{}: {}", kind, err)),
        }
    }
}
