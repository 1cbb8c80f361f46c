//! External tool execution with captured output.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::ProcessError;

use super::command::ToolCommand;

/// Everything a finished tool invocation produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout_lines: Vec<String>,
    pub stderr_lines: Vec<String>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Trait for running external tools.
///
/// This abstraction allows mocking the pack/push subprocesses in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command` to completion and return its captured output.
    ///
    /// A non-zero exit is not an error here; callers inspect
    /// [`ProcessOutput::exit_code`].
    async fn run(&self, command: &ToolCommand) -> Result<ProcessOutput, ProcessError>;
}

/// Runner that spawns real processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    /// `None` waits for the tool indefinitely.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ProcessOutput, ProcessError> {
        let program = command.program.as_str();

        if which::which(program).is_err() {
            return Err(ProcessError::NotInstalled(program.to_string()));
        }

        info!(command = %command, "Running");

        let mut child = Command::new(program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::SpawnFailed {
                program: program.to_string(),
                source,
            })?;

        let output_failed = |source| ProcessError::OutputFailed {
            program: program.to_string(),
            source,
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| output_failed(std::io::Error::other("stdout was not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| output_failed(std::io::Error::other("stderr was not captured")))?;

        let collect = async {
            tokio::try_join!(
                read_lines(stdout, program, "stdout"),
                read_lines(stderr, program, "stderr"),
                child.wait(),
            )
        };

        let collected = match self.timeout {
            Some(limit) => match timeout(limit, collect).await.ok() {
                Some(result) => result,
                None => {
                    warn!(program, limit = ?limit, "Tool timed out, killing it");
                    let _ = child.kill().await;
                    return Err(ProcessError::Timeout {
                        program: program.to_string(),
                        limit,
                    });
                }
            },
            None => collect.await,
        };

        let (stdout_lines, stderr_lines, status) = collected.map_err(output_failed)?;

        debug!(program, code = ?status.code(), "Tool exited");

        Ok(ProcessOutput {
            exit_code: status.code(),
            stdout_lines,
            stderr_lines,
        })
    }
}

/// Read a stream line by line, mirroring each line to the log.
///
/// Invalid UTF-8 is replaced rather than treated as an error.
async fn read_lines<R>(reader: R, program: &str, stream: &'static str) -> std::io::Result<Vec<String>>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut lines = Vec::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let line = String::from_utf8_lossy(&buf)
            .trim_end_matches(['\n', '\r'])
            .to_string();

        if stream == "stderr" {
            warn!(program, stream, "{}", line);
        } else {
            info!(program, stream, "{}", line);
        }
        lines.push(line);
    }

    Ok(lines)
}
