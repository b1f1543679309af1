// subprocess invocation - arguments are always passed as a vector, never through a shell

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::ProcessError;
use crate::utils::decode_output;

/// captured result of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// run `program` with `args` in `cwd`, capturing stdout/stderr.
///
/// a `timeout` of `None` lets the process run to completion. when the timeout
/// elapses the child is killed and `ProcessError::Timeout` is returned.
/// a non-zero exit status is reported as `ProcessError::NonZeroExit` with the
/// captured streams attached so callers can surface the tool's own message.
pub async fn run<I, S>(
    program: &str,
    args: I,
    cwd: &Path,
    timeout: Option<Duration>,
) -> Result<ProcessOutput, ProcessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        // keep svn's messages parseable regardless of the user's locale
        .env("LC_MESSAGES", "C")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(program, cwd = %cwd.display(), "spawning process");

    let child = command.spawn().map_err(|e| ProcessError::SpawnFailed {
        program: program.to_string(),
        reason: e.to_string(),
    })?;

    let output = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(result) => result,
            Err(_) => {
                // the dropped future owns the child, kill_on_drop reaps it
                warn!(program, ?limit, "process timed out");
                return Err(ProcessError::Timeout {
                    program: program.to_string(),
                    timeout: limit,
                });
            }
        },
        None => child.wait_with_output().await,
    }
    .map_err(|e| ProcessError::SpawnFailed {
        program: program.to_string(),
        reason: e.to_string(),
    })?;

    let result = ProcessOutput {
        stdout: decode_output(&output.stdout),
        stderr: decode_output(&output.stderr),
        exit_code: output.status.code(),
    };

    if !output.status.success() {
        debug!(program, code = ?result.exit_code, "process exited unsuccessfully");
        return Err(ProcessError::NonZeroExit {
            program: program.to_string(),
            code: result.exit_code,
            stdout: result.stdout,
            stderr: result.stderr,
        });
    }

    Ok(result)
}
