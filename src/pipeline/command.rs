//! Running external commands.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Output;

use tokio::process::Command;
use tracing::debug;

use super::{PipelineError, Result};

/// Creates a command for `program` running in `workdir`.
pub(crate) fn command(program: impl AsRef<OsStr>, workdir: &Path) -> Command {
    let mut cmd = Command::new(program);
    cmd.current_dir(workdir);
    cmd
}

/// Creates a git command that never prompts for credentials.
pub(crate) fn git_command(git_bin: &Path, workdir: &Path) -> Command {
    let mut cmd = command(git_bin, workdir);
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd
}

/// Renders a command line for logs and errors.
pub(crate) fn describe(cmd: &Command) -> String {
    let std_cmd = cmd.as_std();
    let mut line = std_cmd.get_program().to_string_lossy().into_owned();
    for arg in std_cmd.get_args() {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

/// Runs a command to completion, failing on a non-zero exit.
///
/// Output is captured and logged at debug level either way.
pub(crate) async fn execute(cmd: &mut Command) -> Result<Output> {
    let command = describe(cmd);
    debug!(command = %command, "Running command");

    let output = cmd
        .output()
        .await
        .map_err(|source| PipelineError::Spawn {
            command: command.clone(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!(
        command = %command,
        status = %output.status,
        stdout = %stdout.trim_end(),
        stderr = %stderr.trim_end(),
        "Command finished"
    );

    if output.status.success() {
        Ok(output)
    } else {
        Err(PipelineError::CommandFailed {
            command,
            status: output.status.to_string(),
            stderr: stderr.trim_end().to_string(),
        })
    }
}
