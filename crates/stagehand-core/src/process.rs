//! Subprocess and network probes shared by host implementations.
//!
//! Commands run through a shell detected on `PATH` (bash > sh, `cmd` on
//! Windows). Output is captured in full and capped to the last 10 KiB per
//! stream. The child is killed when the timeout elapses or the cancellation
//! token fires; both outcomes are reported in the returned
//! [`ProcessOutput`] rather than as errors.

use std::process::Stdio;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::process::Command;

use crate::cancel::CancellationToken;
use crate::error::{Result, StagehandError};
use crate::host::{ProcessOutput, ProcessRequest};

const MAX_OUTPUT: usize = 10 * 1024;

/// Shells usable for `sh -c` style invocation, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Sh,
    Cmd,
}

impl Shell {
    pub fn name(&self) -> &'static str {
        match self {
            Shell::Bash => "bash",
            Shell::Sh => "sh",
            Shell::Cmd => "cmd",
        }
    }

    fn command(&self, script: &str) -> Command {
        let mut cmd = Command::new(self.name());
        match self {
            Shell::Cmd => cmd.args(["/C", script]),
            _ => cmd.args(["-c", script]),
        };
        cmd
    }
}

/// Detect the shell used to run commands. Returns None if none is found.
pub fn detect_shell() -> Option<Shell> {
    if cfg!(windows) {
        return which::which("cmd").ok().map(|_| Shell::Cmd);
    }
    if which::which("bash").is_ok() {
        return Some(Shell::Bash);
    }
    if which::which("sh").is_ok() {
        return Some(Shell::Sh);
    }
    None
}

/// Run `request.command` to completion, honouring its timeout and `cancel`.
pub async fn run_shell(request: &ProcessRequest, cancel: &CancellationToken) -> Result<ProcessOutput> {
    let shell = detect_shell().ok_or_else(|| StagehandError::host("no shell found on PATH"))?;

    let mut cmd = shell.command(&request.command);
    if let Some(cwd) = &request.cwd {
        cmd.current_dir(cwd);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| StagehandError::host(format!("failed to spawn '{}': {e}", request.command)))?;

    // Dropping the wait future drops the child, which kills it.
    let wait = child.wait_with_output();
    tokio::select! {
        output = wait => {
            let output = output?;
            Ok(ProcessOutput {
                exit_code: output.status.code(),
                stdout: cap_tail(&String::from_utf8_lossy(&output.stdout)),
                stderr: cap_tail(&String::from_utf8_lossy(&output.stderr)),
                timed_out: false,
                cancelled: false,
            })
        }
        _ = tokio::time::sleep(request.timeout) => {
            tracing::debug!(command = %request.command, "process timed out; killed");
            Ok(ProcessOutput {
                timed_out: true,
                ..ProcessOutput::default()
            })
        }
        _ = cancel.cancelled() => {
            tracing::debug!(command = %request.command, "process cancelled; killed");
            Ok(ProcessOutput {
                cancelled: true,
                ..ProcessOutput::default()
            })
        }
    }
}

/// Keep the last `MAX_OUTPUT` bytes, respecting char boundaries.
fn cap_tail(text: &str) -> String {
    if text.len() <= MAX_OUTPUT {
        return text.to_string();
    }
    let mut start = text.len() - MAX_OUTPUT;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

/// Try to open a TCP connection within `timeout`.
pub async fn probe_tcp(host: &str, port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            tracing::debug!(host, port, error = %e, "port probe refused");
            false
        }
        Err(_) => {
            tracing::debug!(host, port, "port probe timed out");
            false
        }
    }
}
