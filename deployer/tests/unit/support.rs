//! Shared fixtures

use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use tempfile::TempDir;
use tokio::sync::mpsc;
use zip::write::SimpleFileOptions;

use sitedrop::blob::{BlobStore, ObjectBlobStore};
use sitedrop::deploy::builder::Builder;
use sitedrop::deploy::classifier::Classifier;
use sitedrop::deploy::pipeline::Pipeline;
use sitedrop::deploy::publisher::Publisher;
use sitedrop::deploy::runner::{CommandOutput, CommandRunner, CommandSpec};
use sitedrop::errors::DeployError;
use sitedrop::jobs::model::DeploymentJob;
use sitedrop::jobs::store::{JobStore, MemoryJobStore};

pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, data) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data.as_bytes()).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

pub fn base64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// Records commands; the build command writes `dist/` unless told otherwise
#[derive(Default)]
pub struct FakeRunner {
    pub commands: Mutex<Vec<CommandSpec>>,
    pub fail_build: bool,
    pub skip_output: bool,
    pub output_dir: Option<&'static str>,
}

impl FakeRunner {
    pub fn writing_to(output_dir: &'static str) -> Self {
        Self {
            output_dir: Some(output_dir),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_build: true,
            ..Default::default()
        }
    }

    pub fn without_output() -> Self {
        Self {
            skip_output: true,
            ..Default::default()
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|spec| spec.command.clone())
            .collect()
    }

    /// Environment of the last command run
    pub fn last_env(&self) -> Vec<(String, String)> {
        self.commands
            .lock()
            .unwrap()
            .last()
            .map(|spec| spec.env.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        lines: mpsc::UnboundedSender<String>,
    ) -> Result<CommandOutput, DeployError> {
        self.commands.lock().unwrap().push(spec.clone());
        let _ = lines.send(format!("$ {}", spec.command));

        let is_build = !spec.command.contains("install");
        if is_build && self.fail_build {
            let _ = lines.send("error: cannot find module 'react'".to_string());
            return Ok(CommandOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "error: cannot find module 'react'\n".to_string(),
                timed_out: false,
            });
        }

        if is_build && !self.skip_output {
            let dist = spec.working_dir.join(self.output_dir.unwrap_or("dist"));
            tokio::fs::create_dir_all(dist.join("assets")).await?;
            tokio::fs::write(dist.join("index.html"), "<div id=\"root\"></div>").await?;
            tokio::fs::write(dist.join("assets/app.js"), "console.log(1)").await?;
        }

        Ok(CommandOutput {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            timed_out: false,
        })
    }
}

pub struct Fixture {
    pub pipeline: Arc<Pipeline>,
    pub jobs: Arc<MemoryJobStore>,
    pub blobs: Arc<ObjectBlobStore>,
    pub runner: Arc<FakeRunner>,
    pub workspace: TempDir,
}

impl Fixture {
    pub fn new(runner: FakeRunner) -> Self {
        let workspace = TempDir::new().unwrap();
        let jobs = Arc::new(MemoryJobStore::new());
        let blobs = Arc::new(ObjectBlobStore::in_memory());
        let runner = Arc::new(runner);

        let job_store: Arc<dyn JobStore> = jobs.clone();
        let blob_store: Arc<dyn BlobStore> = blobs.clone();
        let command_runner: Arc<dyn CommandRunner> = runner.clone();

        let pipeline = Arc::new(Pipeline::new(
            job_store,
            Classifier::rules_only(),
            Builder::new(command_runner, "npm install", Some(Duration::from_secs(30))),
            Publisher::new(blob_store, 4),
            workspace.path(),
        ));

        Self {
            pipeline,
            jobs,
            blobs,
            runner,
            workspace,
        }
    }

    /// Wait until the job is done
    pub async fn finished(&self, id: &str) -> DeploymentJob {
        for _ in 0..500 {
            if let Some(job) = self.jobs.get(id).await {
                if job.is_done {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("deployment {} did not finish", id);
    }

    pub fn workspace_is_empty(&self) -> bool {
        std::fs::read_dir(self.workspace.path()).unwrap().next().is_none()
    }
}
