//! External process invocation shared by the backends.

use super::PrinterError;
use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Captured result of a finished command.
#[derive(Debug)]
pub(crate) struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stdout and stderr joined, trimmed.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr).trim().to_string()
    }
}

/// Run `program` with `args`, killing it if it outlives `timeout`.
/// A non-zero exit is reported as [`PrinterError::CommandFailed`].
pub(crate) async fn run<I, S>(
    program: &str,
    args: I,
    timeout: Duration,
) -> Result<CommandOutput, PrinterError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(program, "Running spooler command");

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(PrinterError::Launch {
                program: program.to_string(),
                source,
            })
        }
        Err(_) => {
            return Err(PrinterError::Timeout {
                program: program.to_string(),
                after: timeout,
            })
        }
    };

    let result = CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if !output.status.success() {
        return Err(PrinterError::CommandFailed {
            program: program.to_string(),
            status: output.status.to_string(),
            output: result.combined(),
        });
    }

    Ok(result)
}

/// Start `program` without waiting for it to finish.
///
/// The child is reaped on a background task, which resolves to its exit
/// status. Must be called from within a tokio runtime.
pub(crate) fn spawn_detached<I, S>(
    program: &str,
    args: I,
) -> Result<JoinHandle<Option<ExitStatus>>, PrinterError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| PrinterError::Launch {
            program: program.to_string(),
            source,
        })?;

    let program = program.to_string();
    Ok(tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => {
                debug!(program = %program, %status, "Detached command exited");
                Some(status)
            }
            Err(e) => {
                warn!(program = %program, "Failed to wait for detached command: {}", e);
                None
            }
        }
    }))
}
