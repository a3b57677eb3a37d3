//! Command execution utilities for scheduler tools.

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Error type for command execution.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to execute {command}: {error}")]
    Execution { command: String, error: String },
    #[error("Command {command} failed: {stderr}")]
    Failed { command: String, stderr: String },
}

/// Everything a finished child process left behind.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Stdout followed by stderr, for diagnostics.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }
}

/// Execute a command and return stdout as a string.
///
/// A non-zero exit becomes [`CommandError::Failed`] carrying the tool's
/// stderr verbatim.
pub async fn run_command(cmd: &mut Command, name: &str) -> Result<String, CommandError> {
    tracing::debug!(command = name, "running scheduler command");
    let output = cmd.output().await.map_err(|e| CommandError::Execution {
        command: name.to_string(),
        error: e.to_string(),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CommandError::Failed {
            command: name.to_string(),
            stderr: stderr.to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Execute a command, optionally feeding `input` on stdin, and capture
/// both output streams regardless of exit status.
///
/// Only spawn and I/O problems are errors here; the caller decides what a
/// non-zero exit means.
pub async fn capture_command(
    cmd: &mut Command,
    name: &str,
    input: Option<&[u8]>,
) -> Result<CommandOutput, CommandError> {
    let execution = |e: io::Error| CommandError::Execution {
        command: name.to_string(),
        error: e.to_string(),
    };

    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.stdin(if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });

    tracing::debug!(command = name, stdin = input.is_some(), "running scheduler command");
    let mut child = cmd.spawn().map_err(execution)?;

    // Feed stdin while the child runs so neither side blocks on a full pipe.
    let stdin = child.stdin.take();
    let feed = async move {
        match (stdin, input) {
            (Some(mut stdin), Some(input)) => stdin.write_all(input).await,
            _ => Ok(()),
        }
    };
    let (fed, output) = tokio::join!(feed, child.wait_with_output());
    let output = output.map_err(execution)?;

    // A tool may exit before reading all of its input; its status and
    // output still decide the outcome.
    if let Err(e) = fed {
        if e.kind() != io::ErrorKind::BrokenPipe {
            return Err(execution(e));
        }
        tracing::debug!(command = name, "stdin closed before all input was written");
    }

    Ok(CommandOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Locate an executable the way a shell would.
///
/// Names containing a path separator are checked directly; bare names are
/// searched for on `PATH`.
pub fn find_binary(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|p| is_executable(p))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
