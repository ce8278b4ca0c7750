// src/process.rs

//! Timeout-bounded subprocess execution
//!
//! Both index queries (`apt-cache`) and package downloads (`apt-get`) shell
//! out to host tools. Every invocation is bounded by a timeout so a hung tool
//! turns into an ordinary per-item failure instead of stalling the pipeline.

use crate::error::{Error, Result};
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;

/// Captured result of a finished subprocess
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Run `program args...` and wait at most `timeout` for it to exit
///
/// stdout and stderr are drained on helper threads while waiting, so a tool
/// that prints more than a pipe buffer (`apt-cache depends --recurse` easily
/// does) cannot deadlock against us. On timeout the child is killed and
/// [`Error::Timeout`] is returned. A missing executable maps to
/// [`Error::ToolNotFound`].
pub fn run_with_timeout(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput> {
    let shown = command_line(program, args);
    debug!("Executing: {}", shown);

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            Error::ToolNotFound(format!("{} (is it installed?)", program))
        } else {
            Error::CommandFailed(format!("Failed to spawn '{}': {}", shown, e))
        }
    })?;

    let stdout_reader = child.stdout.take().map(spawn_drain);
    let stderr_reader = child.stderr.take().map(spawn_drain);

    let status = match child.wait_timeout(timeout)? {
        Some(status) => status,
        None => {
            // Timeout - kill the process
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Timeout {
                command: shown,
                secs: timeout.as_secs(),
            });
        }
    };

    let stdout = stdout_reader.map(join_drain).unwrap_or_default();
    let stderr = stderr_reader.map(join_drain).unwrap_or_default();

    Ok(CommandOutput {
        success: status.success(),
        status_code: status.code(),
        stdout,
        stderr,
    })
}

/// Like [`run_with_timeout`], but a non-zero exit becomes [`Error::CommandFailed`]
pub fn run_checked(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput> {
    let output = run_with_timeout(program, args, cwd, timeout)?;
    if output.success {
        Ok(output)
    } else {
        Err(Error::CommandFailed(format!(
            "'{}' failed with exit code {}: {}",
            command_line(program, args),
            output.status_code.unwrap_or(-1),
            output.stderr.trim()
        )))
    }
}

fn command_line(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

fn spawn_drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join_drain(handle: thread::JoinHandle<Vec<u8>>) -> String {
    handle
        .join()
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}
