#[cfg(test)]
pub(crate) mod testing;

use std::{
    ffi::OsStr,
    process::Stdio,
    time::{Duration, Instant},
};
use tokio::process::Command;

use crate::{error_code::ErrorCode, future::WithTimeout};

struct MetricsGuard {
    start: Instant,
    armed: bool,
    command: String,
}

impl MetricsGuard {
    fn guard(command: String) -> Self {
        metrics::counter!(crate::init_metrics::PROCESS_START, "command" => command.clone())
            .increment(1);

        Self {
            start: Instant::now(),
            armed: true,
            command,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for MetricsGuard {
    fn drop(&mut self) {
        metrics::histogram!(
            crate::init_metrics::PROCESS_DURATION,
            "command" => self.command.clone(),
            "completed" => (!self.armed).to_string(),
        )
        .record(self.start.elapsed().as_secs_f64());

        metrics::counter!(
            crate::init_metrics::PROCESS_END,
            "completed" => (!self.armed).to_string(),
            "command" => self.command.clone(),
        )
        .increment(1);
    }
}

/// Everything a finished external tool left behind
#[derive(Debug, Clone)]
pub(crate) struct ToolOutput {
    /// `None` when the process was terminated by a signal
    pub(crate) code: Option<i32>,
    pub(crate) stdout: Vec<u8>,
    pub(crate) stderr: Vec<u8>,
}

impl ToolOutput {
    pub(crate) const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    pub(crate) fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Human form of an exit status for error messages
pub(crate) fn exit_status(code: Option<i32>) -> String {
    code.map_or_else(|| String::from("a signal"), |code| format!("status {code}"))
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ProcessError {
    #[error("Required command {0} not found, make sure it exists in tubely's $PATH")]
    NotFound(String),

    #[error("Cannot run command {0} due to invalid permissions on binary, make sure the tubely user has permission to run it")]
    PermissionDenied(String),

    #[error("{0} timed out")]
    Timeout(String),

    #[error("Unknown process error")]
    Other(#[source] std::io::Error),
}

impl ProcessError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::COMMAND_NOT_FOUND,
            Self::PermissionDenied(_) => ErrorCode::COMMAND_PERMISSION_DENIED,
            Self::Timeout(_) => ErrorCode::COMMAND_TIMEOUT,
            Self::Other(_) => ErrorCode::COMMAND_ERROR,
        }
    }

    fn from_spawn(command: &str, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(command.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(command.to_string()),
            _ => Self::Other(error),
        }
    }
}

/// Runs an external tool to completion and hands back its exit code and output.
///
/// A non-zero exit is not an error at this level; callers decide what a failing tool means for
/// them.
#[async_trait::async_trait(?Send)]
pub(crate) trait ToolRunner: Send + Sync + std::fmt::Debug {
    async fn run(&self, command: &str, args: &[&OsStr]) -> Result<ToolOutput, ProcessError>;
}

#[derive(Clone, Debug)]
pub(crate) struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub(crate) fn new(timeout: Option<u64>) -> Self {
        ProcessRunner {
            timeout: timeout.map(Duration::from_secs),
        }
    }
}

#[async_trait::async_trait(?Send)]
impl ToolRunner for ProcessRunner {
    #[tracing::instrument(skip(self, args))]
    async fn run(&self, command: &str, args: &[&OsStr]) -> Result<ToolOutput, ProcessError> {
        let guard = MetricsGuard::guard(command.to_string());

        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = tracing::trace_span!(parent: None, "Spawn command", %command)
            .in_scope(|| cmd.spawn())
            .map_err(|e| ProcessError::from_spawn(command, e))?;

        // the child is killed when the output future is dropped, including on timeout
        let output = match self.timeout {
            Some(timeout) => child
                .wait_with_output()
                .with_timeout(timeout)
                .await
                .map_err(|_| ProcessError::Timeout(command.to_string()))?,
            None => child.wait_with_output().await,
        }
        .map_err(ProcessError::Other)?;

        guard.disarm();

        tracing::debug!(code = ?output.status.code(), "{command} exited");

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
