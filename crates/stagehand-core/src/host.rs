//! The capability surface executors drive.
//!
//! A `Host` is the editing environment seen from the engine: documents,
//! decorations, terminals, debug sessions, host commands, plus the raw
//! process/network/filesystem probes used by validation checks. Nothing in
//! the engine talks to the outside world except through this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::params::{HighlightStyle, LineRange};

/// Where and how to show a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_column: Option<u8>,
    #[serde(default)]
    pub preview: bool,
}

/// A document currently visible in the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleDocument {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_column: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// A shell command to run to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    pub command: String,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutput {
    /// `None` when the process was killed (timeout, cancellation, signal).
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub cancelled: bool,
}

impl ProcessOutput {
    /// Combined stdout/stderr, trimmed.
    pub fn combined(&self) -> String {
        let out = self.stdout.trim();
        let err = self.stderr.trim();
        match (out.is_empty(), err.is_empty()) {
            (true, _) => err.to_string(),
            (false, true) => out.to_string(),
            (false, false) => format!("{out}\n{err}"),
        }
    }
}

#[async_trait]
pub trait Host: Send + Sync {
    /// Current trust posture of the workspace.
    fn is_trusted(&self) -> bool;

    async fn open_document(&self, path: &Path, options: &OpenOptions) -> Result<()>;

    /// Closing a document that is not open succeeds.
    async fn close_document(&self, path: &Path) -> Result<()>;

    async fn visible_documents(&self) -> Result<Vec<VisibleDocument>>;

    /// Apply a line highlight and return its decoration id.
    async fn decorate(&self, path: &Path, lines: LineRange, style: HighlightStyle)
        -> Result<String>;

    /// Disposing an unknown decoration succeeds.
    async fn dispose_decoration(&self, id: &str) -> Result<()>;

    /// Create the named terminal, or reuse it if it already exists.
    async fn create_terminal(&self, name: &str, cwd: Option<&Path>) -> Result<()>;

    async fn send_to_terminal(
        &self,
        name: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Disposing an unknown terminal succeeds.
    async fn dispose_terminal(&self, name: &str) -> Result<()>;

    async fn terminals(&self) -> Result<Vec<String>>;

    /// Returns false when the host declined to start the session.
    async fn start_debugging(&self, config_name: &str, folder: Option<&str>) -> Result<bool>;

    async fn stop_debugging(&self, config_name: &str) -> Result<()>;

    async fn execute_command(
        &self,
        id: &str,
        args: &[serde_json::Value],
    ) -> Result<serde_json::Value>;

    async fn run_process(
        &self,
        request: &ProcessRequest,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput>;

    /// Attempt a TCP connection; `Ok(false)` means refused or timed out.
    async fn probe_port(&self, host: &str, port: u16, timeout: Duration) -> Result<bool>;

    async fn path_exists(&self, path: &Path) -> bool;
}
