//! Transcription executors.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use asrq_config::ExecutorConfig;

use crate::error::QueueError;

/// One invocation of an executor.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub task_id: String,
    /// Audio file to transcribe.
    pub payload: PathBuf,
    /// Device label of the worker running the task.
    pub device: String,
}

/// Turns an audio payload into a transcript.
///
/// A task found processing at startup is executed again, so implementations
/// must tolerate repeated calls for the same task.
#[async_trait]
pub trait Executor: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, request: &ExecutionRequest) -> Result<String, QueueError>;
}

/// Runs an external program per task and returns its trimmed stdout.
pub struct CommandExecutor {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(
            config.program.clone(),
            config.args.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    /// Substitute `{input}`, `{device}` and `{task_id}` in the argument template.
    pub fn render_args(&self, request: &ExecutionRequest) -> Vec<String> {
        let input = request.payload.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input)
                    .replace("{device}", &request.device)
                    .replace("{task_id}", &request.task_id)
            })
            .collect()
    }
}

#[async_trait]
impl Executor for CommandExecutor {
    fn name(&self) -> &str {
        &self.program
    }

    async fn execute(&self, request: &ExecutionRequest) -> Result<String, QueueError> {
        let args = self.render_args(request);
        debug!("Running {} {:?} for task {}", self.program, args, request.task_id);

        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                QueueError::ExecutionFailed(format!(
                    "{} timed out after {}s",
                    self.program,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| QueueError::ExecutionFailed(format!("{}: {}", self.program, e)))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(QueueError::ExecutionFailed(format!(
                "{} exited with code {}: {}",
                self.program,
                code,
                stderr.trim()
            )))
        }
    }
}
