//! External command execution.
//!
//! Thin wrapper over `std::process::Command` that captures stdout/stderr as
//! lossy UTF-8 and optionally feeds stdin. A non-zero exit is not an error at
//! this level; callers decide what a failure means for their tool. Every run
//! has a deadline: a tool still running when it passes is killed.

use crate::ProbeError;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Captured output of a finished command
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// stderr if present, otherwise stdout; trimmed
    pub fn error_text(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Resolve a binary name against PATH
pub fn locate(binary: &str) -> Result<PathBuf, ProbeError> {
    which::which(binary).map_err(|e| ProbeError::ToolNotFound {
        tool: binary.to_string(),
        message: e.to_string(),
    })
}

/// Render a command line for logs and error messages
pub fn display_command(program: &Path, args: &[String]) -> String {
    let name = program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string());
    if args.is_empty() {
        name
    } else {
        format!("{} {}", name, args.join(" "))
    }
}

/// Run a command to completion, killing it once `timeout` has elapsed
pub fn run(
    program: &Path,
    args: &[String],
    stdin: Option<&str>,
    timeout: Duration,
) -> Result<ToolOutput, ProbeError> {
    let command_line = display_command(program, args);
    tracing::debug!(command = %command_line, timeout_ms = timeout.as_millis() as u64, "running");

    let io_error = |e: std::io::Error| ProbeError::Command {
        command: command_line.clone(),
        message: e.to_string(),
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(io_error)?;

    let stdin_pipe = child.stdin.take();
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();

    // stdin must be written while both output pipes drain
    thread::scope(|scope| -> Result<ToolOutput, ProbeError> {
        if let (Some(input), Some(mut pipe)) = (stdin, stdin_pipe) {
            scope.spawn(move || {
                // A tool that exits without reading its input closes the pipe
                // early; its exit status carries the failure.
                let _ = pipe.write_all(input.as_bytes());
            });
        }
        let stdout = scope.spawn(move || read_pipe(stdout_pipe));
        let stderr = scope.spawn(move || read_pipe(stderr_pipe));

        let status = match child.wait_timeout(timeout).map_err(io_error)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                tracing::warn!(command = %command_line, "killed after deadline");
                return Err(ProbeError::Command {
                    command: command_line.clone(),
                    message: format!("timed out after {}ms", timeout.as_millis()),
                });
            }
        };

        let result = ToolOutput {
            success: status.success(),
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        };
        tracing::debug!(command = %command_line, success = result.success, "finished");
        Ok(result)
    })
}

fn read_pipe<R: Read>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).into_owned()
}
