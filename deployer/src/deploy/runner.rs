//! Shell command runners for install and build steps

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::DeployError;

/// How long to keep draining pipes after a timed-out command was killed
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// A command to run through the shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub command: String,
    pub working_dir: PathBuf,
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            working_dir: working_dir.into(),
            env: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal or timed out
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Runs install/build commands. Every output line is also sent to `lines` as it appears.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `spec` to completion. `Err` means the command could not be started.
    async fn run(
        &self,
        spec: &CommandSpec,
        lines: mpsc::UnboundedSender<String>,
    ) -> Result<CommandOutput, DeployError>;
}

/// Runs commands with `sh -c`
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        lines: mpsc::UnboundedSender<String>,
    ) -> Result<CommandOutput, DeployError> {
        debug!("Running `{}` in {}", spec.command, spec.working_dir.display());

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&spec.command)
            .current_dir(&spec.working_dir)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take().map(|out| drain(out, lines.clone()));
        let stderr = child.stderr.take().map(|err| drain(err, lines));

        let (status, timed_out) = match spec.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => (Some(status?), false),
                Err(_) => {
                    warn!("`{}` exceeded {:?}, killing it", spec.command, limit);
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill timed-out command: {}", e);
                    }
                    (None, true)
                }
            },
            None => (Some(child.wait().await?), false),
        };

        Ok(CommandOutput {
            exit_code: status.and_then(|s| s.code()),
            stdout: collect(stdout, timed_out).await,
            stderr: collect(stderr, timed_out).await,
            timed_out,
        })
    }
}

/// Read a pipe line by line, forwarding each line and returning the full text
fn drain<R>(pipe: R, lines: mpsc::UnboundedSender<String>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe);
        let mut captured = String::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\r', '\n']);
                    captured.push_str(line);
                    captured.push('\n');
                    let _ = lines.send(line.to_string());
                }
                Err(e) => {
                    debug!("Stopped reading command output: {}", e);
                    break;
                }
            }
        }

        captured
    })
}

async fn collect(handle: Option<JoinHandle<String>>, timed_out: bool) -> String {
    let Some(mut handle) = handle else {
        return String::new();
    };

    // Grandchildren of a killed command can keep the pipe open
    if timed_out {
        return match tokio::time::timeout(DRAIN_GRACE, &mut handle).await {
            Ok(result) => result.unwrap_or_default(),
            Err(_) => {
                handle.abort();
                String::new()
            }
        };
    }

    handle.await.unwrap_or_default()
}
