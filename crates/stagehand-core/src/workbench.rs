//! `Workbench`: the bundled in-process [`Host`].
//!
//! Models an editor workspace in memory (open documents, decorations,
//! terminals, debug sessions, executed host commands) while delegating
//! process, network and filesystem probes to the real system. Every host
//! call is appended to an ordered journal (`"<op>:<arg>"`), and any
//! operation can be made to fail with [`Workbench::inject_failure`].

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::cancel::CancellationToken;
use crate::error::{Result, StagehandError};
use crate::host::{Host, OpenOptions, ProcessOutput, ProcessRequest, VisibleDocument};
use crate::params::{HighlightStyle, LineRange};
use crate::process;

/// Upper bound for a command typed into a terminal when terminal execution
/// is enabled. Pipeline timeouts normally cancel well before this.
const TERMINAL_COMMAND_LIMIT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
    pub id: String,
    pub path: PathBuf,
    pub lines: LineRange,
    pub style: HighlightStyle,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminalTranscript {
    pub cwd: Option<PathBuf>,
    /// Text sent to the terminal, in order.
    pub input: Vec<String>,
    /// Captured output, filled only when terminal execution is enabled.
    pub output: Vec<String>,
}

#[derive(Debug, Default)]
struct WorkbenchState {
    documents: Vec<VisibleDocument>,
    decorations: BTreeMap<String, Decoration>,
    terminals: BTreeMap<String, TerminalTranscript>,
    debug_sessions: BTreeSet<String>,
    commands: Vec<(String, Vec<serde_json::Value>)>,
    journal: Vec<String>,
    failures: HashMap<String, String>,
    next_decoration: u64,
}

pub struct Workbench {
    /// Workspace root; `None` means documents are virtual and need not exist.
    root: Option<PathBuf>,
    trusted: AtomicBool,
    run_terminal_commands: bool,
    debug_configs: Option<BTreeSet<String>>,
    state: Mutex<WorkbenchState>,
}

impl Workbench {
    /// A workbench rooted at `root`. Documents must exist on disk to open.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::in_memory()
        }
    }

    /// A workbench whose documents are purely virtual.
    pub fn in_memory() -> Self {
        Self {
            root: None,
            trusted: AtomicBool::new(true),
            run_terminal_commands: false,
            debug_configs: None,
            state: Mutex::new(WorkbenchState::default()),
        }
    }

    /// Actually run text sent to terminals through the system shell.
    pub fn with_terminal_execution(mut self, enabled: bool) -> Self {
        self.run_terminal_commands = enabled;
        self
    }

    /// Restrict `start_debugging` to the named launch configurations.
    pub fn with_debug_configs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.debug_configs = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn set_trusted(&self, trusted: bool) {
        self.trusted.store(trusted, Ordering::SeqCst);
    }

    /// Make every future call of `op` fail with `message`.
    pub fn inject_failure(&self, op: &str, message: &str) {
        self.state()
            .failures
            .insert(op.to_string(), message.to_string());
    }

    pub fn clear_failure(&self, op: &str) {
        self.state().failures.remove(op);
    }

    pub fn journal(&self) -> Vec<String> {
        self.state().journal.clone()
    }

    pub fn documents(&self) -> Vec<VisibleDocument> {
        self.state().documents.clone()
    }

    pub fn decorations(&self) -> Vec<Decoration> {
        self.state().decorations.values().cloned().collect()
    }

    pub fn terminal(&self, name: &str) -> Option<TerminalTranscript> {
        self.state().terminals.get(name).cloned()
    }

    pub fn debug_sessions(&self) -> Vec<String> {
        self.state().debug_sessions.iter().cloned().collect()
    }

    pub fn executed_commands(&self) -> Vec<(String, Vec<serde_json::Value>)> {
        self.state().commands.clone()
    }

    fn state(&self) -> MutexGuard<'_, WorkbenchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Journal the call, then fail if a failure was injected for `op`.
    fn record(&self, op: &str, arg: impl std::fmt::Display) -> Result<()> {
        let mut state = self.state();
        state.journal.push(format!("{op}:{arg}"));
        match state.failures.get(op) {
            Some(message) => Err(StagehandError::host(message.clone())),
            None => Ok(()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl Host for Workbench {
    fn is_trusted(&self) -> bool {
        self.trusted.load(Ordering::SeqCst)
    }

    async fn open_document(&self, path: &Path, options: &OpenOptions) -> Result<()> {
        self.record("open_document", path.display())?;
        if self.root.is_some() {
            let resolved = self.resolve(path);
            if !tokio::fs::try_exists(&resolved).await.unwrap_or(false) {
                return Err(StagehandError::host(format!(
                    "file not found: {}",
                    resolved.display()
                )));
            }
        }
        let mut state = self.state();
        state.documents.retain(|d| d.path != path);
        state.documents.push(VisibleDocument {
            path: path.to_path_buf(),
            view_column: options.view_column,
            line: options.line,
        });
        Ok(())
    }

    async fn close_document(&self, path: &Path) -> Result<()> {
        self.record("close_document", path.display())?;
        self.state().documents.retain(|d| d.path != path);
        Ok(())
    }

    async fn visible_documents(&self) -> Result<Vec<VisibleDocument>> {
        Ok(self.state().documents.clone())
    }

    async fn decorate(
        &self,
        path: &Path,
        lines: LineRange,
        style: HighlightStyle,
    ) -> Result<String> {
        self.record("decorate", format!("{}#{lines}", path.display()))?;
        let mut state = self.state();
        if !state.documents.iter().any(|d| d.path == path) {
            return Err(StagehandError::host(format!(
                "document is not open: {}",
                path.display()
            )));
        }
        state.next_decoration += 1;
        let id = format!("decoration-{}", state.next_decoration);
        state.decorations.insert(
            id.clone(),
            Decoration {
                id: id.clone(),
                path: path.to_path_buf(),
                lines,
                style,
            },
        );
        Ok(id)
    }

    async fn dispose_decoration(&self, id: &str) -> Result<()> {
        self.record("dispose_decoration", id)?;
        self.state().decorations.remove(id);
        Ok(())
    }

    async fn create_terminal(&self, name: &str, cwd: Option<&Path>) -> Result<()> {
        self.record("create_terminal", name)?;
        let cwd = cwd.map(|c| self.resolve(c)).or_else(|| self.root.clone());
        self.state()
            .terminals
            .entry(name.to_string())
            .or_insert_with(|| TerminalTranscript {
                cwd,
                ..TerminalTranscript::default()
            });
        Ok(())
    }

    async fn send_to_terminal(
        &self,
        name: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.record("send_to_terminal", format!("{name}:{text}"))?;
        let cwd = {
            let mut state = self.state();
            let terminal = state
                .terminals
                .get_mut(name)
                .ok_or_else(|| StagehandError::host(format!("no terminal named '{name}'")))?;
            terminal.input.push(text.to_string());
            terminal.cwd.clone()
        };
        if !self.run_terminal_commands {
            return Ok(());
        }

        let request = ProcessRequest {
            command: text.to_string(),
            cwd,
            timeout: TERMINAL_COMMAND_LIMIT,
        };
        let output = process::run_shell(&request, cancel).await?;
        if let Some(terminal) = self.state().terminals.get_mut(name) {
            terminal.output.push(output.combined());
        }
        if output.cancelled {
            return Err(StagehandError::Cancelled(format!("terminal command '{text}'")));
        }
        Ok(())
    }

    async fn dispose_terminal(&self, name: &str) -> Result<()> {
        self.record("dispose_terminal", name)?;
        self.state().terminals.remove(name);
        Ok(())
    }

    async fn terminals(&self) -> Result<Vec<String>> {
        Ok(self.state().terminals.keys().cloned().collect())
    }

    async fn start_debugging(&self, config_name: &str, _folder: Option<&str>) -> Result<bool> {
        self.record("start_debugging", config_name)?;
        if let Some(known) = &self.debug_configs {
            if !known.contains(config_name) {
                return Ok(false);
            }
        }
        self.state().debug_sessions.insert(config_name.to_string());
        Ok(true)
    }

    async fn stop_debugging(&self, config_name: &str) -> Result<()> {
        self.record("stop_debugging", config_name)?;
        self.state().debug_sessions.remove(config_name);
        Ok(())
    }

    async fn execute_command(
        &self,
        id: &str,
        args: &[serde_json::Value],
    ) -> Result<serde_json::Value> {
        self.record("execute_command", id)?;
        self.state().commands.push((id.to_string(), args.to_vec()));
        Ok(serde_json::Value::Null)
    }

    async fn run_process(
        &self,
        request: &ProcessRequest,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput> {
        self.record("run_process", &request.command)?;
        let mut request = request.clone();
        request.cwd = request
            .cwd
            .as_deref()
            .map(|c| self.resolve(c))
            .or_else(|| self.root.clone());
        process::run_shell(&request, cancel).await
    }

    async fn probe_port(&self, host: &str, port: u16, timeout: Duration) -> Result<bool> {
        self.record("probe_port", format!("{host}:{port}"))?;
        Ok(process::probe_tcp(host, port, timeout).await)
    }

    async fn path_exists(&self, path: &Path) -> bool {
        if self.record("path_exists", path.display()).is_err() {
            return false;
        }
        tokio::fs::try_exists(self.resolve(path))
            .await
            .unwrap_or(false)
    }
}
