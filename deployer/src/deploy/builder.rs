//! Build executor
//!
//! Runs install and build in the project root, injects the base path the site
//! will be served from, and finds the output directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::deploy::classifier::{DetectedFramework, FrameworkIdentity};
use crate::deploy::locator::MANIFEST_FILE;
use crate::deploy::naming::base_path;
use crate::deploy::runner::{CommandRunner, CommandSpec};
use crate::errors::{BuildStage, DeployError};
use crate::filesys::dir::Dir;
use crate::jobs::store::JobWriter;

/// Directories probed, in order, when the declared output directory is missing
pub const FALLBACK_OUTPUT_DIRS: &[&str] = &[
    "build",
    "dist",
    "out",
    ".next",
    ".output/public",
    "public/build",
    ".svelte-kit/output/client",
];

/// The install/build invocation for one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub build_command: String,
    pub env: Vec<(String, String)>,
    pub notice: Option<String>,
}

/// Adjust the build so asset URLs resolve under `/sites/<project>/`
pub fn plan_build(framework: &DetectedFramework, build_command: &str, project_name: &str) -> BuildPlan {
    let base = base_path(project_name);
    let public_url = vec![("PUBLIC_URL".to_string(), base.clone())];

    match framework.identity {
        FrameworkIdentity::ViteReact => {
            let flag = if build_command.trim_start().starts_with("npm run") {
                format!(" -- --base {}/", base)
            } else {
                format!(" --base {}/", base)
            };
            BuildPlan {
                build_command: format!("{}{}", build_command, flag),
                env: Vec::new(),
                notice: None,
            }
        }
        identity if identity.is_ssr() => BuildPlan {
            build_command: build_command.to_string(),
            env: public_url,
            notice: Some(format!(
                "{} serves from {} only if its base path is configured; check the framework config if assets fail to load",
                identity, base
            )),
        },
        _ => BuildPlan {
            build_command: build_command.to_string(),
            env: public_url,
            notice: None,
        },
    }
}

/// Runs install and build through a `CommandRunner`
#[derive(Clone)]
pub struct Builder {
    runner: Arc<dyn CommandRunner>,
    install_command: String,
    timeout: Option<Duration>,
}

impl Builder {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        install_command: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            runner,
            install_command: install_command.into(),
            timeout,
        }
    }

    /// Install, build, then locate the output. May widen `framework.output_directory`.
    pub async fn build(
        &self,
        root: &Path,
        framework: &mut DetectedFramework,
        project_name: &str,
        job: &JobWriter,
    ) -> Result<PathBuf, DeployError> {
        let Some(build_command) = framework.build_command.clone() else {
            return Ok(root.to_owned());
        };
        let plan = plan_build(framework, &build_command, project_name);

        if tokio::fs::metadata(root.join(MANIFEST_FILE)).await.is_ok() {
            job.log(format!("Installing dependencies: {}", self.install_command)).await;
            let install = CommandSpec::new(self.install_command.clone(), root)
                .with_timeout(self.timeout);
            self.run_step(BuildStage::Install, install, job).await?;
        } else {
            job.log("No package.json in the project root, skipping install").await;
        }

        if let Some(notice) = &plan.notice {
            warn!("{}", notice);
            job.log(format!("Notice: {}", notice)).await;
        }

        job.log(format!("Building: {}", plan.build_command)).await;
        let mut build = CommandSpec::new(plan.build_command.clone(), root).with_timeout(self.timeout);
        for (key, value) in &plan.env {
            build = build.with_env(key.clone(), value.clone());
        }
        self.run_step(BuildStage::Build, build, job).await?;

        let output = discover_output(root, framework, job).await?;
        info!("Build output at {}", output.display());
        Ok(output)
    }

    async fn run_step(&self, stage: BuildStage, spec: CommandSpec, job: &JobWriter) -> Result<(), DeployError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let forwarder = {
            let job = job.clone();
            tokio::spawn(async move {
                while let Some(line) = rx.recv().await {
                    job.log(line).await;
                }
            })
        };

        let result = self.runner.run(&spec, tx).await;
        // The runner dropped its sender, so the forwarder ends once the backlog is flushed
        let _ = forwarder.await;

        let output = result.map_err(|e| DeployError::BuildFailed {
            stage,
            exit_code: None,
            stdout: String::new(),
            stderr: e.to_string(),
        })?;

        if output.success() {
            return Ok(());
        }

        let mut stderr = output.stderr;
        if output.timed_out {
            let limit = spec.timeout.map(|t| t.as_secs()).unwrap_or_default();
            stderr.push_str(&format!("{} step timed out after {}s\n", stage, limit));
        }

        Err(DeployError::BuildFailed {
            stage,
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr,
        })
    }
}

/// Declared output directory first, then the fallback probes
pub async fn discover_output(
    root: &Path,
    framework: &mut DetectedFramework,
    job: &JobWriter,
) -> Result<PathBuf, DeployError> {
    let mut searched = Vec::new();

    if let Some(declared) = framework.output_directory.clone() {
        if Dir::new(root.join(&declared)).exists().await {
            return Ok(root.join(declared));
        }
        searched.push(declared);
    }

    for candidate in FALLBACK_OUTPUT_DIRS {
        if searched.iter().any(|s| s == candidate) {
            continue;
        }
        searched.push(candidate.to_string());

        if Dir::new(root.join(candidate)).exists().await {
            let message = match &framework.output_directory {
                Some(declared) => format!("Output directory {} not found, using {} instead", declared, candidate),
                None => format!("Using output directory {}", candidate),
            };
            warn!("{}", message);
            job.log(message).await;
            framework.output_directory = Some(candidate.to_string());
            return Ok(root.join(candidate));
        }
    }

    let contents = Dir::new(root).entry_names().await.unwrap_or_default();
    Err(DeployError::OutputDirectoryNotFound {
        root: root.to_owned(),
        searched,
        contents,
    })
}
